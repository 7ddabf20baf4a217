//! Integration tests for sandpit-runtime

#[cfg(test)]
mod integration_tests {
    use crate::{
        abi::{ConsoleLevel, RuntimeError, SandboxPolicy},
        context::{ExecutionContext, Program},
        host::NativeHost,
        value::{ErrorValue, Value},
    };
    use sandpit_types::{ExecutionMode, Generation, StdinBuffer};

    struct EmptyProgram;

    impl Program for EmptyProgram {
        fn run(&self, _cx: &mut ExecutionContext) -> Result<(), Value> {
            Ok(())
        }

        fn is_empty(&self) -> bool {
            true
        }
    }

    fn load(host: &mut NativeHost, program: &dyn Program, stdin: &str) -> Generation {
        host.load(ExecutionMode::Script, program, &StdinBuffer::new(stdin))
            .unwrap()
    }

    #[test]
    fn test_timer_output_follows_synchronous_output() {
        let mut host = NativeHost::default();
        let program = |cx: &mut ExecutionContext| -> Result<(), Value> {
            cx.log(&["A".into()]);
            cx.set_timeout(0, |cx| {
                cx.log(&["B".into()]);
                Ok(())
            });
            cx.log(&["C".into()]);
            Ok(())
        };

        load(&mut host, &program, "");
        assert_eq!(host.texts(), vec!["A", "C"]);

        host.run_until_idle().unwrap();
        assert_eq!(host.texts(), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_prompts_answered_from_stdin() {
        let mut host = NativeHost::default();
        let program = |cx: &mut ExecutionContext| -> Result<(), Value> {
            let name = cx.prompt("Name?", None);
            let age = cx.prompt("Age?", None);
            let city = cx.prompt("City?", Some("Pune"));
            cx.log(&[format!("Hello {}, you are {}", name, age).into()]);
            cx.log(&[city.into()]);
            Ok(())
        };

        load(&mut host, &program, "Chandan\n26");
        assert_eq!(host.texts(), vec!["Hello Chandan, you are 26", "Pune"]);
    }

    #[test]
    fn test_logged_promise_pending_then_settled() {
        let mut host = NativeHost::default();
        let program = |cx: &mut ExecutionContext| -> Result<(), Value> {
            let p = cx.delay(100, Value::from(42));
            cx.log(&[Value::Promise(p.clone())]);
            cx.set_timeout(200, move |cx| {
                cx.log(&[Value::Promise(p)]);
                Ok(())
            });
            Ok(())
        };

        load(&mut host, &program, "");
        assert_eq!(host.texts(), vec!["Promise { <pending> }"]);

        host.advance(150).unwrap();
        assert_eq!(host.texts().len(), 1);

        host.run_until_idle().unwrap();
        assert_eq!(
            host.texts(),
            vec!["Promise { <pending> }", "Promise { 42 }"]
        );
    }

    #[test]
    fn test_rejected_promise_logged_is_not_unhandled() {
        let mut host = NativeHost::default();
        let program = |cx: &mut ExecutionContext| -> Result<(), Value> {
            let p = cx.rejected(Value::from("nope"));
            cx.log(&[Value::Promise(p.clone())]);
            cx.set_timeout(0, move |cx| {
                cx.log(&[Value::Promise(p)]);
                Ok(())
            });
            Ok(())
        };

        load(&mut host, &program, "");
        host.run_until_idle().unwrap();
        assert_eq!(
            host.texts(),
            vec!["Promise { <pending> }", "Promise { <rejected> \"nope\" }"]
        );
    }

    #[test]
    fn test_circular_object_logs_once() {
        let mut host = NativeHost::default();
        let program = |cx: &mut ExecutionContext| -> Result<(), Value> {
            let obj = Value::object(vec![("id", Value::from(1))]);
            obj.set_property("me", obj.clone());
            cx.log(&[obj]);
            Ok(())
        };

        load(&mut host, &program, "");
        assert_eq!(host.texts(), vec!["{\"id\": 1, \"me\": [Circular]}"]);
    }

    #[test]
    fn test_uncaught_fault_in_timer_is_single_error_line() {
        let mut host = NativeHost::default();
        let program = |cx: &mut ExecutionContext| -> Result<(), Value> {
            cx.set_timeout(10, |_| {
                Err(Value::fault(
                    ErrorValue::new("TypeError", "x is undefined")
                        .with_stack("TypeError: x is undefined\n    at main.js:4:3"),
                ))
            });
            Ok(())
        };

        load(&mut host, &program, "");
        host.run_until_idle().unwrap();

        let lines = host.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].level, ConsoleLevel::Error);
        assert!(lines[0].text.contains("x is undefined"));
    }

    #[test]
    fn test_throw_in_script_body_is_runtime_error() {
        let mut host = NativeHost::default();
        let program = |cx: &mut ExecutionContext| -> Result<(), Value> {
            cx.log(&["before".into()]);
            Err(Value::error("boom"))
        };

        load(&mut host, &program, "");
        assert_eq!(host.texts(), vec!["before", "Runtime error: boom"]);
    }

    #[test]
    fn test_throw_in_markup_script_is_logged() {
        let mut host = NativeHost::default();
        let program = |_: &mut ExecutionContext| -> Result<(), Value> { Err(Value::error("boom")) };

        host.load(ExecutionMode::Markup, &program, &StdinBuffer::default())
            .unwrap();
        let lines = host.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].level, ConsoleLevel::Error);
        assert_eq!(lines[0].text, "boom");
    }

    #[test]
    fn test_empty_program_reports_placeholder() {
        let mut host = NativeHost::default();
        load(&mut host, &EmptyProgram, "");
        assert_eq!(host.texts(), vec!["(empty code)"]);
    }

    #[test]
    fn test_rerun_replaces_output_and_silences_old_timers() {
        let mut host = NativeHost::default();
        let first = |cx: &mut ExecutionContext| -> Result<(), Value> {
            cx.log(&["first".into()]);
            cx.set_timeout(50, |cx| {
                cx.log(&["stale".into()]);
                Ok(())
            });
            Ok(())
        };
        let second = |cx: &mut ExecutionContext| -> Result<(), Value> {
            cx.log(&["second".into()]);
            Ok(())
        };

        let g1 = load(&mut host, &first, "");
        let g2 = load(&mut host, &second, "");
        assert!(g2 > g1);

        host.run_until_idle().unwrap();
        assert_eq!(host.texts(), vec!["second"]);
        assert!(matches!(
            host.context_for(g1),
            Err(RuntimeError::Superseded { .. })
        ));
        assert!(host.context_for(g2).is_ok());
    }

    #[test]
    fn test_policy_without_scripts_refuses_to_load() {
        let mut host = NativeHost::new(SandboxPolicy::new());
        let program = |_: &mut ExecutionContext| -> Result<(), Value> { Ok(()) };
        let result = host.load(ExecutionMode::Script, &program, &StdinBuffer::default());
        assert!(matches!(result, Err(RuntimeError::PermissionDenied(_))));
    }

    #[test]
    fn test_run_before_load_is_an_error() {
        let mut host = NativeHost::default();
        assert!(matches!(host.run_until_idle(), Err(RuntimeError::NothingLoaded)));
    }
}
