use super::{oneshot_session, println_json, read_source};
use anyhow::Result;
use clap::Parser;
use markdown_preview_sync::render::tokenize;
use markdown_preview_sync::{path_to_token, Config};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct Render {
    /// Markdown file to render.
    file: PathBuf,
}

impl Render {
    pub fn run(&self, config: &Config) -> Result<()> {
        let mut session = oneshot_session(config, &self.file);
        session.render(&read_source(&self.file)?);
        print!("{}", session.html());
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct Tokens {
    /// Markdown file to tokenize.
    file: PathBuf,
}

impl Tokens {
    pub fn run(&self, config: &Config) -> Result<()> {
        let tokens = tokenize(&read_source(&self.file)?, &config.render);
        println_json(&tokens)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct Path {
    /// Markdown file.
    file: PathBuf,

    /// 0-based source line.
    line: usize,
}

impl Path {
    pub fn run(&self, config: &Config) -> Result<()> {
        let tokens = tokenize(&read_source(&self.file)?, &config.render);
        println_json(&path_to_token(&tokens, self.line))
    }
}

#[derive(Parser, Debug, Clone)]
pub struct LineMap {
    /// Markdown file.
    file: PathBuf,
}

impl LineMap {
    pub fn run(&self, config: &Config) -> Result<()> {
        let tokens = tokenize(&read_source(&self.file)?, &config.render);
        println_json(&markdown_preview_sync::LineMap::build(&tokens))
    }
}
