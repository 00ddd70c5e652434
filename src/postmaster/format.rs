use regex::{Captures, Regex};
use std::sync::LazyLock;

const IRC_BOLD: &str = "\x02";
const IRC_ITALICS: &str = "\x1D";
const IRC_UNDERLINE: &str = "\x1F";
const IRC_COLOR: &str = "\x03";

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(strong|b)>").expect("valid bold pattern"));
static ITALICS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(em|i)>").expect("valid italics pattern"));
static UNDERLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?u>").expect("valid underline pattern"));
static COLOR_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<p\s[^>]*?class=["']([^"']*)["'][^>]*>(.*?)</p>"#)
        .expect("valid color span pattern")
});
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid entity pattern")
});

/// The IRC colour code for a colour name
fn color_code(name: &str) -> Option<&'static str> {
    let code = match name.to_ascii_lowercase().as_str() {
        "white" => "00",
        "black" => "01",
        "blue" => "02",
        "green" => "03",
        "red" => "04",
        "brown" => "05",
        "purple" => "06",
        "orange" => "07",
        "yellow" => "08",
        "lime" => "09",
        "teal" => "10",
        "aqua" => "11",
        "royal" => "12",
        "pink" => "13",
        "grey" | "gray" => "14",
        "silver" => "15",
        _ => return None,
    };
    Some(code)
}

/// Translates the small HTML subset plugins write replies in to IRC control codes
///
/// Supported markup: `<strong>`/`<b>` (bold), `<em>`/`<i>` (italics), `<u>` (underline) and
/// `<p class="fg-COLOR bg-COLOR">` colour spans. Entities are decoded afterwards, and line
/// breaks are flattened because a message can only ever be one line on the wire.
#[derive(Debug, Clone, Default)]
pub struct MessageFormatter;

impl MessageFormatter {
    pub fn new() -> Self {
        MessageFormatter
    }

    /// Format a message for the wire
    pub fn format(&self, message: &str) -> String {
        let message = BOLD.replace_all(message, IRC_BOLD);
        let message = ITALICS.replace_all(&message, IRC_ITALICS);
        let message = UNDERLINE.replace_all(&message, IRC_UNDERLINE);
        let message = COLOR_SPAN.replace_all(&message, |captures: &Captures| {
            colorize(&captures[1], &captures[2])
        });
        let message = decode_entities(&message);

        flatten_lines(&message)
    }
}

fn colorize(classes: &str, text: &str) -> String {
    let mut fg = None;
    let mut bg = None;

    for class in classes.split_whitespace() {
        if let Some(name) = class.strip_prefix("fg-") {
            fg = color_code(name).or(fg);
        } else if let Some(name) = class.strip_prefix("bg-") {
            bg = color_code(name).or(bg);
        }
    }

    match (fg, bg) {
        (None, None) => text.to_string(),
        (fg, Some(bg)) => format!(
            "{}{},{}{}{}",
            IRC_COLOR,
            fg.unwrap_or("01"),
            bg,
            text,
            IRC_COLOR
        ),
        (Some(fg), None) => format!("{}{}{}{}", IRC_COLOR, fg, text, IRC_COLOR),
    }
}

fn decode_entities(message: &str) -> String {
    ENTITY
        .replace_all(message, |captures: &Captures| {
            let entity = &captures[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity.strip_prefix('#').and_then(|number| {
                    let code = match number.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => number.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };

            decoded.map_or_else(|| captures[0].to_string(), String::from)
        })
        .into_owned()
}

/// Collapse a multi-line message onto one line
///
/// Lines are joined with a single space, not concatenated, so words either side of a
/// line break stay apart.
fn flatten_lines(message: &str) -> String {
    message
        .replace('\0', "")
        .split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
