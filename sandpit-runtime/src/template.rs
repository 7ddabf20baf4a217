//! Instrumentation script injected into every executable document
//!
//! The script overrides the console, `prompt`, and the global fault and
//! unhandled-rejection handlers, then renders output lines into the
//! `#sandpit-console` element. It mirrors the native formatter so both
//! hosts print values the same way.

use crate::stdin::encode_payload;
use sandpit_types::StdinBuffer;

/// Id of the element receiving rendered output lines
pub const CONSOLE_ELEMENT_ID: &str = "sandpit-console";

/// Raw instrumentation source: a function expression taking the stdin payload
pub const INSTRUMENTATION_SOURCE: &str = include_str!("../assets/instrument.js");

/// Renders the instrumentation for a particular stdin buffer
#[derive(Debug, Clone, Copy)]
pub struct InstrumentationTemplate {
    source: &'static str,
}

impl Default for InstrumentationTemplate {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentationTemplate {
    pub fn new() -> Self {
        Self {
            source: INSTRUMENTATION_SOURCE,
        }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Self-invoking script with the stdin buffer embedded as base64
    pub fn render(&self, stdin: &StdinBuffer) -> String {
        format!("{}(\"{}\");", self.source.trim_end(), encode_payload(stdin))
    }

    /// The rendered script wrapped in a `<script>` element
    pub fn script_element(&self, stdin: &StdinBuffer) -> String {
        format!("<script>\n{}\n</script>\n", self.render(stdin))
    }
}
