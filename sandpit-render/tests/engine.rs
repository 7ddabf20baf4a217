//! Built documents executed in an embedded JS engine
//!
//! Each test builds a document, runs its inline scripts in order against a
//! small browser surface, drains microtasks after every script and timer, and
//! reads back the lines the instrumentation rendered into the console element.

use once_cell::sync::Lazy;
use regex::Regex;
use rquickjs::{Context, Function, Runtime};
use sandpit_render::DocumentBuilder;
use sandpit_runtime::InstrumentationTemplate;
use sandpit_types::{files, ExecutionMode, SourceFileSet, StdinBuffer};

const DOM_SHIM: &str = include_str!("support/dom.js");

static INLINE_SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").unwrap());

static SRC_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\ssrc\s*=").unwrap());

struct Page {
    context: Context,
    runtime: Runtime,
}

impl Page {
    fn blank() -> Self {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| ctx.eval::<(), _>(DOM_SHIM)).unwrap();
        Self { context, runtime }
    }

    /// Run every inline script of `document`, then fire timers until none remain
    fn open(document: &str) -> Self {
        let page = Self::blank();
        for caps in INLINE_SCRIPT_RE.captures_iter(document) {
            if SRC_ATTR_RE.is_match(&caps[1]) {
                continue;
            }
            page.run_script(&caps[2]);
        }
        page.context
            .with(|ctx| ctx.eval::<(), _>("__fireDomContentLoaded()"))
            .unwrap();
        page.settle();
        page
    }

    fn run_script(&self, source: &str) {
        self.context.with(|ctx| {
            let run: Function = ctx.globals().get("__runScript").unwrap();
            run.call::<_, ()>((source.to_string(),)).unwrap();
        });
        self.drain_microtasks();
    }

    fn drain_microtasks(&self) {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(_) => continue,
            }
        }
    }

    fn settle(&self) {
        self.drain_microtasks();
        while self.context.with(|ctx| {
            let next: Function = ctx.globals().get("__runNextTimer").unwrap();
            next.call::<_, bool>(()).unwrap()
        }) {
            self.drain_microtasks();
        }
    }

    fn texts(&self) -> Vec<String> {
        self.context
            .with(|ctx| ctx.eval::<Vec<String>, _>("__consoleTexts()"))
            .unwrap()
    }

    fn levels(&self) -> Vec<String> {
        self.context
            .with(|ctx| ctx.eval::<Vec<String>, _>("__consoleLevels()"))
            .unwrap()
    }

    fn uncaught(&self) -> Vec<String> {
        self.context
            .with(|ctx| ctx.eval::<Vec<String>, _>("__uncaught"))
            .unwrap()
    }
}

fn markup_page(script: &str) -> Page {
    let mut set = SourceFileSet::empty();
    set.set(files::MARKUP, "<html><head></head><body><div id=\"app\"></div></body></html>");
    set.set(files::STYLE, "");
    set.set(files::SCRIPT, script);
    let doc = DocumentBuilder::new().build(ExecutionMode::Markup, &set, &StdinBuffer::default());
    Page::open(&doc.text)
}

fn script_page(entry: &str, stdin: &str) -> Page {
    let mut set = SourceFileSet::with_defaults();
    set.set(files::ENTRY, entry);
    let doc = DocumentBuilder::new().build(ExecutionMode::Script, &set, &StdinBuffer::new(stdin));
    Page::open(&doc.text)
}

#[test]
fn test_timer_output_follows_synchronous_output() {
    let page = markup_page(
        "console.log('A');\nsetTimeout(() => console.log('B'), 0);\nconsole.log('C');",
    );
    assert_eq!(page.texts(), vec!["A", "C", "B"]);
    assert_eq!(page.levels(), vec!["log", "log", "log"]);
}

#[test]
fn test_cycles_are_marked_per_path() {
    let page = markup_page(
        "const o = { a: 1 };\no.self = o;\nconsole.log(o);\n\
         const shared = { x: 1 };\nconsole.log([shared, shared]);",
    );
    assert_eq!(
        page.texts(),
        vec![r#"{"a": 1, "self": [Circular]}"#, r#"[{"x": 1}, {"x": 1}]"#]
    );
}

#[test]
fn test_promise_reads_pending_then_settled() {
    let page = markup_page(
        "const p = new Promise((resolve) => setTimeout(() => resolve(42), 10));\n\
         console.log(p);\nsetTimeout(() => console.log(p), 20);",
    );
    assert_eq!(page.texts(), vec!["Promise { <pending> }", "Promise { 42 }"]);
}

#[test]
fn test_prompt_reads_stdin_in_order_then_defaults() {
    let page = script_page(
        "const name = prompt('name?');\nconst age = prompt('age?');\n\
         const extra = prompt('extra?', 'dflt');\nconst none = prompt('none?');\n\
         console.log(name, age, extra);\nconsole.log(JSON.stringify(none));",
        "Chandan\n26",
    );
    assert_eq!(page.texts(), vec!["Chandan 26 dflt", r#""""#]);
}

#[test]
fn test_prompt_decodes_non_ascii_stdin() {
    let page = script_page("console.log(prompt());", "héllo ✓\r\n");
    assert_eq!(page.texts(), vec!["héllo ✓"]);
}

#[test]
fn test_markup_throw_is_one_error_line() {
    let page = markup_page("console.log('before');\nthrow new Error('boom');\nconsole.log('never');");
    assert_eq!(page.levels(), vec!["log", "error"]);
    assert_eq!(page.texts()[0], "before");
}

#[test]
fn test_uncaught_timer_fault_is_one_error_line() {
    let page = markup_page(
        "setTimeout(() => { throw new Error('late'); }, 0);\n\
         setTimeout(() => console.log('still running'), 5);",
    );
    assert_eq!(page.levels(), vec!["error", "log"]);
    assert_eq!(page.texts()[1], "still running");
    assert!(page.uncaught().is_empty());
}

#[test]
fn test_script_throw_is_reported_as_runtime_error() {
    let page = script_page(
        "console.log('before');\nthrow { message: 'boom', lineNumber: 3 };",
        "",
    );
    assert_eq!(page.texts(), vec!["before", "Runtime error: boom at line 3"]);
    assert_eq!(page.levels(), vec!["log", "error"]);
}

#[test]
fn test_script_runs_as_async_unit() {
    let page = script_page(
        "console.log('A');\nawait null;\nconsole.log('B');\n\
         const v = await new Promise((r) => setTimeout(() => r('C'), 5));\nconsole.log(v);",
        "",
    );
    assert_eq!(page.texts(), vec!["A", "B", "C"]);
}

#[test]
fn test_empty_script_reports_empty_code() {
    let page = script_page("   \n", "");
    assert_eq!(page.texts(), vec!["(empty code)"]);
}

#[test]
fn test_default_markup_runs_script_once() {
    let doc = DocumentBuilder::new().build(
        ExecutionMode::Markup,
        &SourceFileSet::with_defaults(),
        &StdinBuffer::default(),
    );
    let page = Page::open(&doc.text);
    assert_eq!(page.texts(), vec!["hello from script.js"]);
}

#[test]
fn test_instrumentation_installs_once() {
    let page = Page::blank();
    let instrumentation = InstrumentationTemplate::new().render(&StdinBuffer::default());
    page.run_script(&instrumentation);
    page.run_script(&instrumentation);
    page.run_script("console.log('once');");
    page.settle();
    assert_eq!(page.texts(), vec!["once"]);
}
