use crate::rules::{Directive, Sign};

pub(crate) fn header(text: &str) -> String {
    format!("===\n=== {text}\n===")
}

pub(crate) fn directive_line(directive: &Directive, as_arg: bool) -> String {
    if as_arg {
        directive.to_arg()
    } else {
        directive.to_string()
    }
}

pub(crate) fn decision_line(rel: &str, transferred: bool) -> String {
    let sign = if transferred {
        Sign::Include
    } else {
        Sign::Exclude
    };
    format!("{sign} {rel}")
}
