use markdown_preview_sync::image::{EventSender, FileSubscription};
use markdown_preview_sync::{
    decode_tag, element_for_path, encode_tag, line_for_element, path_to_element, path_to_token,
    render, Fragment, ImageWatcher, LineMap, Nesting, PathEntry, RenderOptions, Token,
    UpdatePreview, WatchError,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DOCUMENT: &str = "\
# Title

Intro paragraph
spanning two lines.

- one
- two
  - nested

> quote
>
> second

1. first
2. second

---

## Section

final
";

fn preview_of(source: &str, options: &RenderOptions) -> (UpdatePreview, Vec<Token>) {
    let rendered = render(source, options);
    let mut preview = UpdatePreview::new();
    preview.update(Fragment::parse(&rendered.html), options.math);
    (preview, rendered.tokens)
}

fn entries(path: &[(&str, usize)]) -> Vec<PathEntry> {
    path.iter().map(|&(tag, index)| PathEntry::new(tag, index)).collect()
}

#[test]
fn test_update_is_idempotent() {
    let rendered = render(DOCUMENT, &RenderOptions::default());
    let mut preview = UpdatePreview::new();

    let first = preview.update(Fragment::parse(&rendered.html), false);
    assert!(!first.inserted.is_empty());
    let html = preview.inner_html();

    let second = preview.update(Fragment::parse(&rendered.html), false);
    assert!(second.inserted.is_empty());
    assert!(second.is_empty());
    assert_eq!(preview.inner_html(), html);
}

#[test]
fn test_live_preview_matches_render() {
    let options = RenderOptions::default();
    let mut preview = UpdatePreview::new();

    let edits = [
        DOCUMENT,
        "# Title\n\nIntro paragraph\nspanning two lines.\n",
        "# Title\n\n- a\n- b\n\nIntro paragraph\nspanning two lines.\n",
        "# Renamed\n\n- a\n- c\n- b\n",
        DOCUMENT,
    ];
    for source in edits {
        let html = render(source, &options).html;
        preview.update(Fragment::parse(&html), false);
        assert_eq!(preview.inner_html(), Fragment::parse(&html).inner_html());
    }
}

fn long_document(marker: &str) -> String {
    let mut source = format!("# {marker}\n\n");
    for n in 0..1500 {
        source.push_str(&format!("paragraph {n}\n\n"));
    }
    source.push_str(&format!("end {marker}\n"));
    source
}

#[test]
fn test_edits_at_both_ends_of_a_long_document() {
    let options = RenderOptions::default();
    let (mut preview, _) = preview_of(&long_document("A"), &options);
    let before = preview.dom().elements_by_tag(preview.container(), "p");
    assert_eq!(before.len(), 1501);

    let html = render(&long_document("B"), &options).html;
    let fragment = Fragment::parse(&html);
    let started = Instant::now();
    let result = preview.update(fragment, false);
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_secs(5), "update took {elapsed:?}");

    // Only the heading and the last paragraph are swapped.
    assert_eq!(result.inserted.len(), 2);
    let after = preview.dom().elements_by_tag(preview.container(), "p");
    assert_eq!(after[..1500], before[..1500]);
    assert_ne!(after[1500], before[1500]);
    assert_eq!(preview.inner_html(), Fragment::parse(&html).inner_html());
}

#[test]
fn test_deeply_nested_quotes() {
    let depth = 20_000;
    let source = |leaf: &str| format!("{}{leaf}\n", "> ".repeat(depth));
    let options = RenderOptions::default();
    let (mut preview, _) = preview_of(&source("x"), &options);

    let rendered = render(&source("y"), &options);
    let fragment = Fragment::parse(&rendered.html);
    let expected = fragment.inner_html();
    let result = preview.update(fragment, false);
    assert_eq!(result.inserted.len(), 1);
    assert_eq!(preview.inner_html(), expected);

    let dom = preview.dom();
    let p = result.inserted[0];
    assert_eq!(dom.tag(p), Some("p"));
    let path = path_to_element(dom, preview.container(), p).unwrap();
    assert_eq!(path.len(), depth + 2);
    assert_eq!(path[depth + 1], PathEntry::new("p", 0));
    assert_eq!(
        line_for_element(&rendered.tokens, dom, preview.container(), p).unwrap(),
        Some(0)
    );
}

#[test]
fn test_line_element_round_trip() {
    let (preview, tokens) = preview_of(DOCUMENT, &RenderOptions::default());
    let (dom, root) = (preview.dom(), preview.container());
    let line_count = DOCUMENT.lines().count();

    let mut checked = 0;
    for line in 0..line_count {
        let path = path_to_token(&tokens, line);
        if path.is_empty() {
            continue;
        }
        let element = element_for_path(dom, root, &path)
            .unwrap_or_else(|| panic!("line {line} resolves to no element"));
        let back = path_to_element(dom, root, element).unwrap();
        assert_eq!(back[0], PathEntry::new("div", 0));
        assert_eq!(back[1..], path[..], "line {line}");
        checked += 1;
    }
    assert!(checked >= 10);
}

#[test]
fn test_line_map_agrees_with_token_walk() {
    let options = RenderOptions::default().with_math(true);
    let source = format!("{DOCUMENT}\n```math\nx^2\n```\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
    let tokens = render(&source, &options).tokens;
    let line_map = LineMap::build(&tokens);

    for line in 0..source.lines().count() {
        assert_eq!(line_map.path(line), &path_to_token(&tokens, line)[..], "line {line}");
    }
}

#[test]
fn test_nested_paths() {
    let tokens = render(DOCUMENT, &RenderOptions::default()).tokens;

    assert_eq!(path_to_token(&tokens, 0), entries(&[("h1", 0)]));
    assert_eq!(path_to_token(&tokens, 3), entries(&[("p", 0)]));
    assert_eq!(
        path_to_token(&tokens, 7),
        entries(&[("ul", 0), ("li", 1), ("ul", 0), ("li", 0)])
    );
    assert_eq!(
        path_to_token(&tokens, 11),
        entries(&[("blockquote", 0), ("p", 1)])
    );
    assert_eq!(path_to_token(&tokens, 14), entries(&[("ol", 0), ("li", 1)]));
    assert_eq!(path_to_token(&tokens, 16), entries(&[("hr", 0)]));
    assert_eq!(path_to_token(&tokens, 20), entries(&[("p", 1)]));
    assert!(path_to_token(&tokens, 1).is_empty());
    assert!(path_to_token(&tokens, 100).is_empty());
}

#[test]
fn test_table_paths_stop_at_the_table() {
    let source = "intro\n\n| a | b |\n|---|---|\n| 1 | 2 |\n| 3 | 4 |\n\nafter\n";
    let tokens = render(source, &RenderOptions::default()).tokens;

    for line in 2..6 {
        assert_eq!(path_to_token(&tokens, line), entries(&[("table", 0)]));
    }
    assert_eq!(path_to_token(&tokens, 7), entries(&[("p", 1)]));

    let line_map = LineMap::build(&tokens);
    assert_eq!(line_map.path(4), &entries(&[("table", 0)])[..]);
}

#[test]
fn test_math_and_code_tags_are_symmetric() {
    let options = RenderOptions::default().with_math(true);
    let source = "```math\nx^2\n```\n\n```rust\nfn main() {}\n```\n";
    let (preview, tokens) = preview_of(source, &options);
    let (dom, root) = (preview.dom(), preview.container());

    assert_eq!(tokens[0].tag, "math");
    assert_eq!(decode_tag(&tokens[0]), Some("span"));
    assert_eq!(tokens[1].tag, "code");
    assert_eq!(decode_tag(&tokens[1]), Some("span"));
    assert_eq!(decode_tag(&Token::new("", Nesting::SelfClosing, 0)), None);

    let children: Vec<_> = dom.element_children(root).collect();
    assert_eq!(children.len(), 2);
    assert_eq!(dom.tag(children[0]), Some("span"));
    assert_eq!(encode_tag(dom, children[0]), "math");
    assert_eq!(encode_tag(dom, children[1]), "code");

    // A click inside the code block resolves to the block itself.
    let code = dom.elements_by_tag(root, "code")[0];
    assert_eq!(
        path_to_element(dom, root, code).unwrap(),
        entries(&[("div", 0), ("code", 0)])
    );
    assert_eq!(line_for_element(&tokens, dom, root, code).unwrap(), Some(4));
    assert_eq!(line_for_element(&tokens, dom, root, children[0]).unwrap(), Some(0));
}

#[test]
fn test_sibling_index_matches_position() {
    for n in 1..=6 {
        let source = (0..n)
            .map(|i| format!("paragraph {i}\n"))
            .collect::<Vec<_>>()
            .join("\n");
        let (preview, tokens) = preview_of(&source, &RenderOptions::default());
        let (dom, root) = (preview.dom(), preview.container());

        let paragraphs = dom.elements_by_tag(root, "p");
        assert_eq!(paragraphs.len(), n);
        for (k, &p) in paragraphs.iter().enumerate() {
            let path = path_to_element(dom, root, p).unwrap();
            assert_eq!(path.last(), Some(&PathEntry::new("p", k)));
            assert_eq!(line_for_element(&tokens, dom, root, p).unwrap(), Some(2 * k));
        }
    }
}

#[test]
fn test_title_and_text_scenario() {
    let source = "# Title\n\nSome *text*.\n";
    let (preview, tokens) = preview_of(source, &RenderOptions::default());

    let blocks: Vec<_> = tokens
        .iter()
        .filter(|token| token.level == 0 && token.nesting == Nesting::Open)
        .map(|token| (token.tag.as_str(), token.map))
        .collect();
    assert_eq!(blocks, vec![("h1", Some([0, 1])), ("p", Some([2, 3]))]);

    assert_eq!(path_to_token(&tokens, 0), entries(&[("h1", 0)]));
    assert_eq!(path_to_token(&tokens, 2), entries(&[("p", 0)]));

    let (dom, root) = (preview.dom(), preview.container());
    let p = dom.elements_by_tag(root, "p")[0];
    let path = path_to_element(dom, root, p).unwrap();
    assert_eq!(path, entries(&[("div", 0), ("p", 0)]));
    assert_eq!(path[1..], path_to_token(&tokens, 2)[..]);

    // Clicking the emphasis resolves to the paragraph line.
    let em = dom.elements_by_tag(root, "em")[0];
    assert_eq!(line_for_element(&tokens, dom, root, em).unwrap(), Some(2));
    assert_eq!(line_for_element(&tokens, dom, root, p).unwrap(), Some(2));
}

#[derive(Clone, Default)]
struct RecordingWatch {
    files: Arc<Mutex<HashSet<PathBuf>>>,
    live: Arc<Mutex<HashSet<PathBuf>>>,
}

struct RecordingSubscription {
    path: PathBuf,
    live: Arc<Mutex<HashSet<PathBuf>>>,
}

impl FileSubscription for RecordingSubscription {}

impl Drop for RecordingSubscription {
    fn drop(&mut self) {
        self.live.lock().unwrap().remove(&self.path);
    }
}

impl markdown_preview_sync::FileWatch for RecordingWatch {
    fn is_regular_file(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains(path)
    }

    fn subscribe(
        &self,
        path: &Path,
        _sender: EventSender,
    ) -> Result<Box<dyn FileSubscription>, WatchError> {
        self.live.lock().unwrap().insert(path.to_path_buf());
        Ok(Box::new(RecordingSubscription {
            path: path.to_path_buf(),
            live: self.live.clone(),
        }))
    }
}

#[test]
fn test_image_watches_follow_references() {
    let all = ["/img/a.png", "/img/b.png", "/img/c.png", "/img/d.png"];
    let backend = RecordingWatch::default();
    backend
        .files
        .lock()
        .unwrap()
        .extend(all.iter().map(PathBuf::from));
    let mut watcher = ImageWatcher::new(backend.clone(), |_: &Path, _| {});

    let renders: [&[&str]; 4] = [
        &["/img/a.png", "/img/b.png"],
        &["/img/b.png"],
        &["/img/c.png", "/img/d.png", "/img/b.png"],
        &[],
    ];
    for referenced in renders {
        watcher.track();
        for path in referenced {
            assert!(watcher.watch(Path::new(path)).is_some());
        }
        watcher.untrack();

        let live = backend.live.lock().unwrap().clone();
        let expected: HashSet<PathBuf> = referenced.iter().map(PathBuf::from).collect();
        assert_eq!(live, expected);
    }
}
