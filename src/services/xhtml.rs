use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use scraper::{ElementRef, Html, Node};

use crate::error::{AppError, Result};

/// HTML elements that never have content; written as `<name/>`.
const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

/// Elements dropped entirely, children included.
const STRIP_TAGS: [&str; 7] = ["script", "style", "noscript", "iframe", "form", "nav", "template"];

/// Re-serialize an HTML fragment as well-formed XHTML.
pub fn xhtml_fragment(html: &str) -> Result<String> {
    let fragment = Html::parse_fragment(html);
    xhtml_children(fragment.root_element())
}

/// Children of `el` as XHTML, with scripts, styles and page chrome removed.
pub fn xhtml_children(el: ElementRef<'_>) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_children(&mut writer, el)?;
    String::from_utf8(writer.into_inner()).map_err(xhtml_error)
}

fn write_children(writer: &mut Writer<Vec<u8>>, el: ElementRef<'_>) -> Result<()> {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            write_element(writer, child_el)?;
        } else if let Node::Text(text) = child.value() {
            let text = xml_chars(text);
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(xhtml_error)?;
        }
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: ElementRef<'_>) -> Result<()> {
    let name = el.value().name();
    if STRIP_TAGS.contains(&name) {
        return Ok(());
    }
    // Unknown prefixes and junk names cannot be expressed; keep the content
    if !is_xml_name(name) {
        return write_children(writer, el);
    }

    let mut start = BytesStart::new(name);
    for (key, value) in el.value().attrs() {
        if is_xml_name(key) {
            start.push_attribute((key, xml_chars(value).as_str()));
        }
    }

    if VOID_ELEMENTS.contains(&name) {
        return writer.write_event(Event::Empty(start)).map_err(xhtml_error);
    }

    writer.write_event(Event::Start(start)).map_err(xhtml_error)?;
    write_children(writer, el)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xhtml_error)
}

/// Drop characters XML 1.0 does not allow.
fn xml_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && !matches!(c, '\u{FFFE}' | '\u{FFFF}')))
        .collect()
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn xhtml_error(err: impl std::fmt::Display) -> AppError {
    AppError::Epub(format!("cannot serialize XHTML: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_well_formed;

    #[test]
    fn test_void_elements_are_self_closed() {
        let out = xhtml_fragment("<p>One&nbsp;two<br>three</p><img src=a.png><hr>").unwrap();
        assert_eq!(out, "<p>One\u{a0}two<br/>three</p><img src=\"a.png\"/><hr/>");
        assert_well_formed(&format!("<div>{}</div>", out));
    }

    #[test]
    fn test_text_and_attributes_are_escaped() {
        let out = xhtml_fragment(r#"<a href="/q?a=1&amp;b=2" title='say "hi"'>1 &lt; 2 &amp; 3</a>"#).unwrap();
        assert!(out.contains("a=1&amp;b=2"));
        assert!(out.contains("1 &lt; 2 &amp; 3"));
        assert_well_formed(&out);
    }

    #[test]
    fn test_scripts_and_odd_names_are_dropped() {
        let out = xhtml_fragment(r#"<div @click="go" x:y="1"><script>alert(1)</script><p>kept</p></div>"#).unwrap();
        assert_eq!(out, "<div><p>kept</p></div>");
    }

    #[test]
    fn test_unclosed_tags_are_balanced() {
        let out = xhtml_fragment("<ul><li>one<li>two</ul><p>open").unwrap();
        assert_well_formed(&format!("<div>{}</div>", out));
        assert!(out.ends_with("<p>open</p>"));
    }
}
