//! Common regex patterns for result parsing.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "Label: value", label without colons, value may span lines
    pub static ref KEY_VALUE: Regex = Regex::new(
        r"^([^:\n]+):\s*([\s\S]+)$"
    ).unwrap();

    // Fenced code block, optionally tagged json
    pub static ref FENCED_BLOCK: Regex = Regex::new(
        r"```(?:json|JSON)?[ \t]*\r?\n?([\s\S]*?)```"
    ).unwrap();
}
