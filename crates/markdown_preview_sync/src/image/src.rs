//! Reading and rewriting `<img src>` values.

use super::{FileWatch, ImageWatcher};
use once_cell::sync::Lazy;
use preview_dom::{Dom, NodeId};
use regex::Regex;
use std::path::{Path, PathBuf};

static VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?v=\d+$").unwrap());

/// `src` without a trailing `?v=<version>`.
pub fn strip_version(src: &str) -> &str {
    match VERSION_SUFFIX.find(src) {
        Some(suffix) => &src[..suffix.start()],
        None => src,
    }
}

fn with_version(src: &str, version: Option<u64>) -> String {
    let src = strip_version(src);
    match version {
        Some(version) => format!("{src}?v={version}"),
        None => src.to_string(),
    }
}

/// Resolves an image `src` to a local file path.
///
/// Remote URLs and data URIs resolve to `None`. Relative paths are resolved
/// against `base_dir` and need one.
pub fn resolve_image_path(src: &str, base_dir: Option<&Path>) -> Option<PathBuf> {
    let src = strip_version(src);
    if src.is_empty()
        || src.starts_with("http://")
        || src.starts_with("https://")
        || src.starts_with("data:")
        || src.starts_with("//")
    {
        return None;
    }

    let src = src.strip_prefix("file://").unwrap_or(src);
    let decoded = percent_encoding::percent_decode_str(src).decode_utf8_lossy();
    let path = Path::new(decoded.as_ref());

    if path.is_absolute() {
        Some(path.to_path_buf())
    } else {
        base_dir.map(|base| base.join(path))
    }
}

fn images<'a>(dom: &'a Dom, root: NodeId) -> impl Iterator<Item = (NodeId, &'a str)> + 'a {
    dom.elements_by_tag(root, "img")
        .into_iter()
        .filter_map(move |img| dom.attr(img, "src").map(|src| (img, src)))
}

/// Registers every local image below `root` with `watcher` and stamps its
/// `src` with the current version. Returns the number of stamped images.
pub fn stamp_image_versions<W: FileWatch>(
    dom: &mut Dom,
    root: NodeId,
    base_dir: Option<&Path>,
    watcher: &mut ImageWatcher<W>,
) -> usize {
    let mut stamps = Vec::new();
    for (img, src) in images(dom, root) {
        let Some(path) = resolve_image_path(src, base_dir) else {
            continue;
        };
        if let Some(version) = watcher.watch(&path) {
            stamps.push((img, with_version(src, Some(version))));
        }
    }

    let stamped = stamps.len();
    for (img, src) in stamps {
        dom.set_attr(img, "src", &src);
    }
    stamped
}

/// Points every `<img>` showing `path` at `version`, or strips the version
/// when it is `None`. Returns the number of rewritten images.
pub fn apply_image_version(
    dom: &mut Dom,
    root: NodeId,
    base_dir: Option<&Path>,
    path: &Path,
    version: Option<u64>,
) -> usize {
    let rewrites: Vec<_> = images(dom, root)
        .filter(|(_, src)| resolve_image_path(src, base_dir).as_deref() == Some(path))
        .filter_map(|(img, src)| {
            let updated = with_version(src, version);
            (updated != src).then_some((img, updated))
        })
        .collect();

    let rewritten = rewrites.len();
    for (img, src) in rewrites {
        dom.set_attr(img, "src", &src);
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::tests::FakeWatch;
    use preview_dom::Fragment;

    #[test]
    fn test_strip_version() {
        assert_eq!(strip_version("a.png?v=123"), "a.png");
        assert_eq!(strip_version("a.png?v=12x"), "a.png?v=12x");
        assert_eq!(strip_version("a.png"), "a.png");
    }

    #[test]
    fn test_resolve_image_path() {
        let base = Path::new("/notes");
        assert_eq!(
            resolve_image_path("img/a%20b.png?v=1", Some(base)),
            Some(PathBuf::from("/notes/img/a b.png"))
        );
        assert_eq!(
            resolve_image_path("file:///tmp/x.png", Some(base)),
            Some(PathBuf::from("/tmp/x.png"))
        );
        assert_eq!(resolve_image_path("https://example.com/x.png", Some(base)), None);
        assert_eq!(resolve_image_path("data:image/png;base64,AAAA", Some(base)), None);
        assert_eq!(resolve_image_path("//cdn.example.com/x.png", Some(base)), None);
        assert_eq!(resolve_image_path("img/a.png", None), None);
    }

    #[test]
    fn test_stamp_and_apply_versions() {
        let mut fragment = Fragment::parse(
            "<p><img src=\"a.png\"><img src=\"https://example.com/b.png\"><img src=\"missing.png\"></p>",
        );
        let mut watcher = ImageWatcher::new(FakeWatch::with_files(&["/doc/a.png"]), |_: &Path, _| {});
        let base = Some(Path::new("/doc"));

        let stamped = stamp_image_versions(&mut fragment.dom, fragment.root, base, &mut watcher);
        assert_eq!(stamped, 1);

        let version = watcher.version(Path::new("/doc/a.png")).unwrap();
        let img = fragment.dom.elements_by_tag(fragment.root, "img")[0];
        assert_eq!(
            fragment.dom.attr(img, "src"),
            Some(format!("a.png?v={version}").as_str())
        );

        let path = Path::new("/doc/a.png");
        let rewritten =
            apply_image_version(&mut fragment.dom, fragment.root, base, path, Some(version + 5));
        assert_eq!(rewritten, 1);
        assert_eq!(
            fragment.dom.attr(img, "src"),
            Some(format!("a.png?v={}", version + 5).as_str())
        );

        apply_image_version(&mut fragment.dom, fragment.root, base, path, None);
        assert_eq!(fragment.dom.attr(img, "src"), Some("a.png"));
        assert_eq!(
            apply_image_version(&mut fragment.dom, fragment.root, base, path, None),
            0
        );
    }
}
