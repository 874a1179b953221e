//! Integration tests for the Quill interpreter
//!
//! Tests whole programs through the public pipeline:
//! - Lexing, parsing, and evaluation together
//! - Imports resolved against real files
//! - Garbage collection behavior over long-running programs
//! - Output produced by builtin printing

use quill::interp::{display_value, ErrorKind, Interpreter, Value};
use quill::lexer::tokenize;
use quill::parser::parse;

/// Parse and run a program on a fresh interpreter.
fn run_program(source: &str) -> (Interpreter, Value) {
    let tokens = tokenize(source).expect("lexing failed");
    let program = parse(tokens).expect("parsing failed");
    let mut interp = Interpreter::new();
    let value = match interp.run(&program) {
        Ok(value) => value,
        Err(err) => panic!("runtime error: {err}"),
    };
    (interp, value)
}

fn run_value(source: &str) -> Value {
    run_program(source).1
}

fn run_rendered(source: &str) -> String {
    let (interp, value) = run_program(source);
    display_value(interp.heap(), value)
}

fn run_error(source: &str) -> quill::interp::RuntimeError {
    let tokens = tokenize(source).expect("lexing failed");
    let program = parse(tokens).expect("parsing failed");
    let mut interp = Interpreter::new();
    interp.run(&program).expect_err("program should fail")
}

/// Run a program and hand back everything it printed.
fn run_output(source: &str) -> String {
    let tokens = tokenize(source).expect("lexing failed");
    let program = parse(tokens).expect("parsing failed");
    let mut interp = Interpreter::new();
    let out = interp.heap_mut().capture_output();
    if let Err(err) = interp.run(&program) {
        panic!("runtime error: {err}");
    }
    let captured = out.borrow().clone();
    captured
}

// ============================================
// Whole-program behavior
// ============================================

#[test]
fn test_hello_world() {
    assert_eq!(run_output(r#"println("hello, world");"#), "hello, world\n");
}

#[test]
fn test_fizzbuzz_output() {
    let source = r#"
        for (i = 1 to 15) {
            if (i % 15 == 0) { println("fizzbuzz"); }
            else if (i % 3 == 0) { println("fizz"); }
            else if (i % 5 == 0) { println("buzz"); }
            else { println(i); }
        }
    "#;
    let expected = "1\n2\nfizz\n4\nbuzz\nfizz\n7\n8\nfizz\nbuzz\n11\nfizz\n13\n14\nfizzbuzz\n";
    assert_eq!(run_output(source), expected);
}

#[test]
fn test_interpret_runs_to_completion() {
    let tokens = tokenize("let x = 1; x + 1;").unwrap();
    let program = parse(tokens).unwrap();
    assert!(Interpreter::new().interpret(&program).is_ok());
}

#[test]
fn test_interpret_surfaces_errors() {
    let tokens = tokenize("1 / 0;").unwrap();
    let program = parse(tokens).unwrap();
    let err = Interpreter::new().interpret(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ZeroDivision);
}

#[test]
fn test_repl_style_sessions_accumulate() {
    // one interpreter, several programs, like the REPL drives it
    let mut interp = Interpreter::new();
    for line in [
        "let total = 0;",
        "fn bump(n) { total = total + n; return total; }",
        "bump(5);",
        "bump(7);",
    ] {
        let tokens = tokenize(line).unwrap();
        let program = parse(tokens).unwrap();
        interp.run(&program).unwrap();
    }
    assert_eq!(interp.global("total"), Some(Value::Int(12)));
}

#[test]
fn test_closures_keep_independent_state() {
    let source = "
        fn make_counter() {
            let count = 0;
            fn tick() {
                count = count + 1;
                return count;
            }
            return tick;
        }
        let a = make_counter();
        let b = make_counter();
        a();
        a();
        b();
        [a(), b()];
    ";
    assert_eq!(run_rendered(source), "[3, 2]");
}

#[test]
fn test_class_driven_program() {
    let source = r#"
        class Stack {
            fn init() {
                this.items = [];
            }
            fn add(v) {
                push(this.items, v);
                return this;
            }
            fn take() {
                return pop(this.items);
            }
            fn size() {
                return length(this.items);
            }
        }
        let s = new Stack();
        s.add(1);
        s.add(2);
        s.add(3);
        let top = s.take();
        [top, s.size()];
    "#;
    assert_eq!(run_rendered(source), "[3, 2]");
}

#[test]
fn test_shadowing_across_functions_and_blocks() {
    let source = "
        let x = 1;
        fn probe() { return x; }
        {
            let x = 2;
            x = x + 1;
        }
        [x, probe()];
    ";
    // the block's x was a different binding; probe sees the global
    assert_eq!(run_rendered(source), "[1, 1]");
}

#[test]
fn test_numeric_overflow_promotes_end_to_end() {
    assert_eq!(run_rendered("type(9223372036854775807 + 1);"), "float");
    assert_eq!(run_rendered("type(1 + 1);"), "int");
}

#[test]
fn test_unicode_strings_measure_in_characters() {
    assert_eq!(run_value(r#""こんにちは".length;"#), Value::Int(5));
    assert_eq!(run_rendered(r#"substring("こんにちは", 1, 3);"#), "んに");
}

#[test]
fn test_nested_data_displays_recursively() {
    assert_eq!(run_rendered("[1, [2, [3]], 4];"), "[1, [2, [3]], 4]");
    assert_eq!(
        run_rendered(r#"let d = {"a": [1, 2], "b": {"c": 3}}; d;"#),
        "{a: [1, 2], b: {c: 3}}"
    );
}

#[test]
fn test_builtin_pipeline() {
    let source = r#"
        let xs = [3, 1, 2];
        sort(xs);
        join(xs, ",");
    "#;
    assert_eq!(run_rendered(source), "1,2,3");
}

#[test]
fn test_dict_iteration_snapshot_ignores_inserts() {
    // keys added while iterating are not visited
    let source = r#"
        let d = {"a": 1, "b": 2};
        let visited = 0;
        for (k in d) {
            visited = visited + 1;
            d[k + "!"] = 0;
        }
        visited;
    "#;
    assert_eq!(run_value(source), Value::Int(2));
}

// ============================================
// Errors and control flow
// ============================================

#[test]
fn test_try_catch_finally_ordering() {
    let source = r#"
        fn risky() {
            println("before");
            [1][5];
            println("unreached");
        }
        try {
            risky();
        } catch (e) {
            println("caught");
        } finally {
            println("finally");
        }
        println("after");
    "#;
    assert_eq!(run_output(source), "before\ncaught\nfinally\nafter\n");
}

#[test]
fn test_catch_message_names_the_kind() {
    let source = r#"
        let msg = "";
        try { [1][5]; } catch (e) { msg = e; }
        msg;
    "#;
    let text = run_rendered(source);
    assert!(text.contains("Index out of bounds"), "got: {text}");
}

#[test]
fn test_finally_return_wins() {
    let source = "
        fn f() {
            try {
                return 1;
            } finally {
                return 2;
            }
        }
        f();
    ";
    assert_eq!(run_value(source), Value::Int(2));
}

#[test]
fn test_uncaught_errors_carry_their_kind() {
    assert_eq!(run_error("missing;").kind, ErrorKind::Undefined);
    assert_eq!(run_error("1 / 0;").kind, ErrorKind::ZeroDivision);
    assert_eq!(run_error(r#"1 + true;"#).kind, ErrorKind::TypeError);
    assert_eq!(run_error("[1][3];").kind, ErrorKind::IndexOutOfBounds);
}

#[test]
fn test_recursion_ceiling_is_survivable() {
    let source = r#"
        fn dive(n) { return dive(n + 1); }
        let note = "none";
        try { dive(0); } catch (e) { note = e; }
        note;
    "#;
    let text = run_rendered(source);
    assert!(text.contains("recursion limit"), "got: {text}");
}

#[test]
fn test_deep_but_legal_recursion_completes() {
    let source = "
        fn sum_to(n) {
            if (n == 0) { return 0; }
            return n + sum_to(n - 1);
        }
        sum_to(900);
    ";
    assert_eq!(run_value(source), Value::Int(405450));
}

// ============================================
// Imports
// ============================================

#[test]
fn test_import_defines_into_importing_scope() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("lib.ql");
    std::fs::write(&lib, "let answer = 42;\nfn double(n) { return n * 2; }\n").unwrap();

    let source = format!(r#"import "{}"; double(answer);"#, lib.display());
    assert_eq!(run_value(&source), Value::Int(84));
}

#[test]
fn test_import_runs_once_per_path() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("noisy.ql");
    std::fs::write(&lib, r#"println("loaded");"#).unwrap();

    let source = format!(
        r#"import "{0}"; import "{0}"; println("done");"#,
        lib.display()
    );
    assert_eq!(run_output(&source), "loaded\ndone\n");
}

#[test]
fn test_import_chain_shares_one_scope() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.ql");
    let upper = dir.path().join("upper.ql");
    std::fs::write(&base, "let base_value = 10;\n").unwrap();
    std::fs::write(
        &upper,
        format!(
            "import \"{}\";\nlet upper_value = base_value + 1;\n",
            base.display()
        ),
    )
    .unwrap();

    let source = format!(r#"import "{}"; upper_value + base_value;"#, upper.display());
    assert_eq!(run_value(&source), Value::Int(21));
}

#[test]
fn test_import_requires_ql_extension() {
    let err = run_error(r#"import "lib.txt";"#);
    assert_eq!(err.kind, ErrorKind::Runtime);
}

#[test]
fn test_missing_import_is_catchable() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.ql");
    let source = format!(
        r#"
            let recovered = false;
            try {{ import "{}"; }} catch (e) {{ recovered = true; }}
            recovered;
        "#,
        missing.display()
    );
    assert_eq!(run_value(&source), Value::Bool(true));
}

#[test]
fn test_broken_import_is_not_catchable() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.ql");
    std::fs::write(&broken, "let = ;\n").unwrap();

    // parse failures in a module are syntax errors, and a catch cannot
    // swallow those
    let source = format!(
        r#"try {{ import "{}"; }} catch (e) {{ }}"#,
        broken.display()
    );
    let err = run_error(&source);
    assert_eq!(err.kind, ErrorKind::Syntax);
}

#[test]
fn test_imported_functions_close_over_importer_globals() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("closing.ql");
    std::fs::write(&lib, "fn read_shared() { return shared; }\n").unwrap();

    let source = format!(
        r#"let shared = 7; import "{}"; read_shared();"#,
        lib.display()
    );
    assert_eq!(run_value(&source), Value::Int(7));
}

// ============================================
// Garbage collection
// ============================================

#[test]
fn test_gc_reclaims_unreachable_data() {
    let source = "
        for (i = 1 to 5000) {
            let scratch = [i, [i, i], [i]];
        }
    ";
    let (interp, _) = run_program(source);
    assert!(
        interp.heap().live() < 1000,
        "live objects after churn: {}",
        interp.heap().live()
    );
}

#[test]
fn test_gc_reclaims_cycles() {
    let source = r#"
        fn knot() {
            let a = {};
            let b = {};
            a["next"] = b;
            b["next"] = a;
        }
        for (i = 1 to 3000) { knot(); }
    "#;
    let (interp, _) = run_program(source);
    assert!(
        interp.heap().live() < 1000,
        "live objects after cycle churn: {}",
        interp.heap().live()
    );
}

#[test]
fn test_gc_keeps_working_set_intact() {
    // interleave keeper allocations with garbage so collections run while
    // the keepers are live, then verify every keeper survived unscathed
    let source = r#"
        let keep = {};
        for (i = 1 to 500) {
            keep["k" + i] = [i, "v" + i];
            let junk = ["waste", [i, i, i]];
        }
        let total = 0;
        for (k in keep) {
            total = total + keep[k][0];
        }
        total;
    "#;
    assert_eq!(run_value(source), Value::Int(125250));
}

#[test]
fn test_gc_respects_data_reachable_only_through_closures() {
    let source = r#"
        fn make_holder() {
            let payload = [1, 2, 3];
            fn get() { return payload; }
            return get;
        }
        let holder = make_holder();
        for (i = 1 to 2000) {
            let junk = [i, i + 1];
        }
        length(holder());
    "#;
    assert_eq!(run_value(source), Value::Int(3));
}
