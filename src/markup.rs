//! Structural HTML events and markup reconstruction.
//!
//! The html5ever tokenizer turns a fragment into a flat stream of
//! [`MarkupEvent`]s. [`StructuralReader`] replays that stream into a
//! [`MarkupBuffer`], keeping only what sits inside `<body>`, and lets a
//! [`MarkupObserver`] look at the buffer around every tag boundary.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use std::cell::RefCell;

/// Elements that never take an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub self_closing: bool,
}

impl StartTag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Space-separated tokens of the `class` attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").into_iter().flat_map(str::split_whitespace)
    }

    fn is_void(&self) -> bool {
        self.self_closing || VOID_ELEMENTS.contains(&self.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent {
    StartTag(StartTag),
    EndTag(String),
    /// Decoded character data
    Text(String),
    /// Contents of `style`/`script`, which must not be re-escaped
    RawText(String),
    Comment(String),
}

struct EventSink {
    events: RefCell<Vec<MarkupEvent>>,
    raw: RefCell<Option<String>>,
}

impl EventSink {
    fn push_text(&self, text: &str) {
        let raw = self.raw.borrow().is_some();
        let mut events = self.events.borrow_mut();
        // the tokenizer hands text over in chunks
        match (events.last_mut(), raw) {
            (Some(MarkupEvent::Text(prev)), false) | (Some(MarkupEvent::RawText(prev)), true) => {
                prev.push_str(text)
            }
            (_, true) => events.push(MarkupEvent::RawText(text.to_string())),
            (_, false) => events.push(MarkupEvent::Text(text.to_string())),
        }
    }
}

impl TokenSink for EventSink {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => {
                let name = tag.name.to_string();
                match tag.kind {
                    TagKind::StartTag => {
                        let attrs = tag
                            .attrs
                            .iter()
                            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                            .collect();
                        self.events.borrow_mut().push(MarkupEvent::StartTag(StartTag {
                            name: name.clone(),
                            attrs,
                            self_closing: tag.self_closing,
                        }));
                        let kind = match name.as_str() {
                            _ if tag.self_closing => None,
                            "style" | "xmp" | "iframe" | "noembed" | "noframes" => Some(RawKind::Rawtext),
                            "script" => Some(RawKind::ScriptData),
                            "title" | "textarea" => Some(RawKind::Rcdata),
                            _ => None,
                        };
                        if let Some(kind) = kind {
                            if !matches!(kind, RawKind::Rcdata) {
                                *self.raw.borrow_mut() = Some(name);
                            }
                            return TokenSinkResult::RawData(kind);
                        }
                    }
                    TagKind::EndTag => {
                        let mut raw = self.raw.borrow_mut();
                        if raw.as_deref() == Some(name.as_str()) {
                            *raw = None;
                        }
                        self.events.borrow_mut().push(MarkupEvent::EndTag(name));
                    }
                }
            }
            Token::CharacterTokens(text) => self.push_text(&text),
            Token::NullCharacterToken => self.push_text("\u{fffd}"),
            Token::CommentToken(text) => {
                self.events.borrow_mut().push(MarkupEvent::Comment(text.to_string()))
            }
            Token::DoctypeToken(_) | Token::EOFToken | Token::ParseError(_) => {}
        }
        TokenSinkResult::Continue
    }
}

/// Tokenize `html` into markup events in source order. Never fails; malformed
/// markup yields whatever the tokenizer recovers.
pub fn tokenize(html: &str) -> Vec<MarkupEvent> {
    let sink = EventSink {
        events: RefCell::new(Vec::new()),
        raw: RefCell::new(None),
    };
    let tokenizer = Tokenizer::new(sink, TokenizerOpts::default());
    let input = BufferQueue::default();
    input.push_back(StrTendril::from_slice(html));
    // the sink never returns TokenSinkResult::Script, so this is always Done
    let _ = tokenizer.feed(&input);
    tokenizer.end();
    tokenizer.sink.events.into_inner()
}

/// Concatenated text content of an HTML fragment, tags and comments removed.
pub fn extract_text(html: &str) -> String {
    tokenize(html)
        .into_iter()
        .filter_map(|event| match event {
            MarkupEvent::Text(text) | MarkupEvent::RawText(text) => Some(text),
            _ => None,
        })
        .collect()
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Running markup reconstructed from events, with the stack of elements
/// still open at the end of it.
#[derive(Debug, Default)]
pub struct MarkupBuffer {
    html: String,
    open: Vec<String>,
}

impl MarkupBuffer {
    pub fn as_str(&self) -> &str {
        &self.html
    }

    /// Elements opened but not yet closed, outermost first
    pub fn open_elements(&self) -> &[String] {
        &self.open
    }

    pub fn is_balanced(&self) -> bool {
        self.open.is_empty()
    }

    /// Closing tags for every open element, innermost first
    pub fn closing_tags(&self) -> String {
        self.open.iter().rev().map(|name| format!("</{name}>")).collect()
    }

    pub fn into_string(self) -> String {
        self.html
    }

    /// Append escaped text without ever leaving a blank line behind.
    ///
    /// Hosts that embed the body in CommonMark end an HTML block at the first
    /// blank line, so a newline that would close a whitespace-only line is
    /// written as a character reference instead.
    fn push_text(&mut self, escaped: &str) {
        for c in escaped.chars() {
            if c == '\n' && self.on_blank_line() {
                self.html.push_str("&#10;");
            } else {
                self.html.push(c);
            }
        }
    }

    fn on_blank_line(&self) -> bool {
        let line = self.html.rsplit('\n').next().unwrap_or_default();
        line.chars().all(|c| c == ' ' || c == '\t')
    }

    fn push(&mut self, event: &MarkupEvent) {
        match event {
            MarkupEvent::StartTag(tag) => {
                self.html.push('<');
                self.html.push_str(&tag.name);
                for (key, value) in &tag.attrs {
                    self.html.push(' ');
                    self.html.push_str(key);
                    self.html.push_str("=\"");
                    self.html.push_str(&escape_html(value));
                    self.html.push('"');
                }
                self.html.push_str(if tag.self_closing { " />" } else { ">" });
                if !tag.is_void() {
                    self.open.push(tag.name.clone());
                }
            }
            MarkupEvent::EndTag(name) => {
                self.html.push_str("</");
                self.html.push_str(name);
                self.html.push('>');
                // unmatched end tags are kept verbatim but leave the stack alone
                if let Some(pos) = self.open.iter().rposition(|open| open == name) {
                    self.open.truncate(pos);
                }
            }
            MarkupEvent::Text(text) => self.push_text(&escape_html(text)),
            MarkupEvent::RawText(text) => self.html.push_str(text),
            MarkupEvent::Comment(text) => {
                self.html.push_str("<!--");
                self.html.push_str(text);
                self.html.push_str("-->");
            }
        }
    }
}

/// Receives tag boundaries from a [`StructuralReader`].
pub trait MarkupObserver {
    /// Called before `tag` is appended to `buffer`.
    fn start_tag(&mut self, _tag: &StartTag, _buffer: &MarkupBuffer) {}

    /// Called after the end tag `name` is appended to `buffer`.
    fn end_tag(&mut self, _name: &str, _buffer: &MarkupBuffer) {}
}

/// Rebuilds the contents of `<body>` from markup events.
///
/// Only the outermost `<body>`/`</body>` pair switches buffering on and off.
/// Nested body tags, such as those of a full HTML document shown as a cell
/// output, are dropped while their contents are kept.
#[derive(Debug, Default)]
pub struct StructuralReader {
    buffer: MarkupBuffer,
    body_depth: usize,
}

impl StructuralReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, event: MarkupEvent, observer: &mut impl MarkupObserver) {
        match &event {
            MarkupEvent::StartTag(tag) if tag.name == "body" => {
                if !tag.self_closing {
                    self.body_depth += 1;
                }
                return;
            }
            MarkupEvent::EndTag(name) if name == "body" => {
                if self.body_depth == 1 {
                    observer.end_tag(name, &self.buffer);
                }
                self.body_depth = self.body_depth.saturating_sub(1);
                return;
            }
            _ if self.body_depth == 0 => return,
            _ => {}
        }

        match &event {
            MarkupEvent::StartTag(tag) => {
                observer.start_tag(tag, &self.buffer);
                self.buffer.push(&event);
            }
            MarkupEvent::EndTag(name) => {
                self.buffer.push(&event);
                observer.end_tag(name, &self.buffer);
            }
            _ => self.buffer.push(&event),
        }
    }

    /// Tokenize `html` and feed every event through `observer`.
    pub fn read(mut self, html: &str, observer: &mut impl MarkupObserver) -> MarkupBuffer {
        for event in tokenize(html) {
            self.feed(event, observer);
        }
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Silent;
    impl MarkupObserver for Silent {}

    fn body_of(html: &str) -> String {
        StructuralReader::new().read(html, &mut Silent).into_string()
    }

    #[test]
    fn extract_text_drops_tags_and_comments() {
        let html = "<div class=\"x\"><p>Hello <b>big</b> world</p><!-- hidden --></div>";
        assert_eq!(extract_text(html), "Hello big world");
    }

    #[test]
    fn extract_text_decodes_entities() {
        assert_eq!(extract_text("<p>a &lt; b &amp; c</p>"), "a < b & c");
    }

    #[test]
    fn extract_text_tolerates_malformed_markup() {
        assert_eq!(extract_text("<p>open <i>never closed</p></span>tail"), "open never closedtail");
    }

    #[test]
    fn style_contents_are_raw_text() {
        let events = tokenize("<style>p > a { color: red; }</style>");
        assert_eq!(events[1], MarkupEvent::RawText("p > a { color: red; }".into()));
    }

    #[test]
    fn only_body_is_buffered() {
        assert_eq!(body_of("<head><title>t</title></head><body><p>x</p></body>"), "<p>x</p>");
    }

    #[test]
    fn reconstructs_tags_attributes_and_text() {
        let html = "<body><p class=\"a b\" id=\"q\">1 &lt; 2</p><br><!--c--></body>";
        assert_eq!(body_of(html), "<p class=\"a b\" id=\"q\">1 &lt; 2</p><br><!--c-->");
    }

    #[test]
    fn raw_text_is_not_escaped() {
        let html = "<body><script>if (a < b) {}</script></body>";
        assert_eq!(body_of(html), "<script>if (a < b) {}</script>");
    }

    #[test]
    fn nested_body_keeps_later_content() {
        let html = "<body><p>a</p><html><body><p>inner</p></body></html><p>after</p></body><p>outside</p>";
        assert_eq!(body_of(html), "<p>a</p><html><p>inner</p></html><p>after</p>");
    }

    #[test]
    fn blank_lines_become_character_references() {
        let html = "<body><pre>def f():\n    pass\n\n    \ndef g():</pre>\n\n<p>x</p></body>";
        let body = body_of(html);
        assert_eq!(body, "<pre>def f():\n    pass\n&#10;    \ndef g():</pre>\n&#10;<p>x</p>");
        assert!(!body.lines().any(|line| line.trim().is_empty()));
        assert_eq!(extract_text(&body), "def f():\n    pass\n\n    \ndef g():\n\nx");
    }

    #[test]
    fn nbsp_round_trips_as_entity() {
        assert_eq!(body_of("<body><div>In&nbsp;[1]:</div></body>"), "<div>In&nbsp;[1]:</div>");
    }

    #[test]
    fn open_elements_track_nesting() {
        let buffer = StructuralReader::new().read("<body><div><p>x</p><img src=\"a.png\"><span>", &mut Silent);
        assert_eq!(buffer.open_elements(), ["div", "span"]);
        assert_eq!(buffer.closing_tags(), "</span></div>");
        assert!(!buffer.is_balanced());
    }

    #[test]
    fn unmatched_end_tags_are_tolerated() {
        let buffer = StructuralReader::new().read("<body><p>x</div></p></body>", &mut Silent);
        assert!(buffer.is_balanced());
        assert_eq!(buffer.as_str(), "<p>x</div></p>");
    }

    #[test]
    fn classes_split_on_whitespace() {
        let tag = StartTag {
            name: "div".into(),
            attrs: vec![("class".into(), "cell  border-box-sizing\tcode_cell".into())],
            self_closing: false,
        };
        assert_eq!(tag.classes().collect::<Vec<_>>(), ["cell", "border-box-sizing", "code_cell"]);
    }

    proptest! {
        #[test]
        fn extract_text_reproduces_text_nodes(parts in prop::collection::vec("[a-zA-Z0-9 .,!?]{0,12}", 1..8)) {
            let html: String = parts
                .iter()
                .enumerate()
                .map(|(i, part)| if i % 2 == 0 { format!("<p>{part}</p>") } else { format!("<em class=\"k\">{part}</em>") })
                .collect();
            let text = extract_text(&html);
            prop_assert_eq!(&text, &parts.concat());
            prop_assert!(!text.contains('<') && !text.contains('>'));
        }
    }
}
