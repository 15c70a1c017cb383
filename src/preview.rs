//! Single-page HTML preview of a project.
//!
//! Shows what the archive will contain before it is shipped: the rendered
//! README, then every generated file with its install path and raw contents.
//! The page is self-contained (inline CSS, no scripts) so it can be opened
//! straight from disk. The README interpolates project and feed names, so
//! raw HTML in it is shown as text rather than passed through.

use crate::generate::{self, Artifact};
use crate::types::ProjectConfig;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Event, Parser, html as md_html};

const CSS: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 60rem; margin: 2rem auto; padding: 0 1rem; color: #222; }
nav ul { columns: 2; font-family: ui-monospace, monospace; font-size: 0.9rem; }
section.artifact { border-top: 1px solid #ddd; margin-top: 2rem; }
section.artifact h2 { font-family: ui-monospace, monospace; font-size: 1rem; }
pre { background: #f6f6f6; padding: 0.75rem; overflow-x: auto; }
.kind { color: #777; font-weight: normal; }
"#;

/// Render the preview page for `config`.
pub fn render_preview(config: &ProjectConfig) -> Markup {
    let artifacts = generate::artifacts(config);
    let readme = artifacts.iter().find(|a| a.kind == generate::ArtifactKind::Readme);
    let title = if config.project.name.is_empty() {
        "unnamed project"
    } else {
        config.project.name.as_str()
    };

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " - preview" }
                style { (PreEscaped(CSS)) }
            }
            body {
                nav {
                    ul {
                        @for artifact in &artifacts {
                            li { a href={ "#" (anchor(&artifact.path)) } { (artifact.install_path) } }
                        }
                    }
                }
                @if let Some(readme) = readme {
                    article.readme { (render_markdown(&readme.contents)) }
                }
                @for artifact in &artifacts {
                    (render_artifact(artifact))
                }
            }
        }
    }
}

fn render_artifact(artifact: &Artifact) -> Markup {
    html! {
        section.artifact id=(anchor(&artifact.path)) {
            h2 {
                (artifact.install_path)
                " "
                span.kind { (format!("{:?}", artifact.kind)) }
            }
            pre { code { (artifact.contents) } }
        }
    }
}

fn render_markdown(text: &str) -> Markup {
    let mut body = String::new();
    let events = Parser::new(text).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    md_html::push_html(&mut body, events);
    PreEscaped(body)
}

fn anchor(path: &str) -> String {
    path.replace(['/', '.'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use crate::types::Feed;

    #[test]
    fn preview_is_a_document() {
        let page = render_preview(&moon_config()).into_string();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>Moon Extractor - preview</title>"));
    }

    #[test]
    fn preview_lists_every_install_path() {
        let config = moon_config();
        let page = render_preview(&config).into_string();
        for artifact in generate::artifacts(&config) {
            assert!(page.contains(&artifact.install_path), "{} missing", artifact.path);
        }
        assert!(page.contains(r#"id="scripts-device-1-sh""#));
    }

    #[test]
    fn readme_is_rendered_as_html() {
        let page = render_preview(&moon_config()).into_string();
        assert!(page.contains("<h1>Moon Extractor</h1>"));
        assert!(page.contains("<h2>Device 1</h2>"));
    }

    #[test]
    fn file_contents_are_escaped() {
        let mut config = moon_config();
        config.feeds[0].command = "echo '<b>' && cat /dev/ttyS0".into();
        let page = render_preview(&config).into_string();
        assert!(page.contains("&lt;b&gt;"));
        assert!(!page.contains("echo '<b>'"));
    }

    #[test]
    fn markup_in_names_is_shown_as_text() {
        let mut config = moon_config();
        config.project.name = "Moon <b>Extractor</b>".into();
        config.feeds[0].hint = "<script>alert(1)</script>".into();
        config.feeds.push(Feed::new("df -h", "<img src=x onerror=alert(1)>"));
        let page = render_preview(&config).into_string();
        assert!(!page.contains("<script"));
        assert!(!page.contains("<img"));
        assert!(!page.contains("<b>Extractor"));
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(page.contains("&lt;b&gt;Extractor&lt;/b&gt;"));
    }

    #[test]
    fn unnamed_project_gets_placeholder_title() {
        let mut config = moon_config();
        config.project.name.clear();
        let page = render_preview(&config).into_string();
        assert!(page.contains("<title>unnamed project - preview</title>"));
    }
}
