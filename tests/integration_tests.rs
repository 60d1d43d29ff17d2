// Integration tests for the Monkey interpreter
//
// The first half is a table-driven robustness suite for the parser: every input
// must either parse or produce an error, never a panic. The second half runs
// whole programs through parse + evaluate.

use monkey::{Environment, MonkeyError, Program, Value};
use std::rc::Rc;

/// Test result for a single test case
#[derive(Debug)]
pub enum TestResult {
    Pass,
    Fail(String),
    Crash(String),
}

/// Individual test case
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub input: String,
    pub should_succeed: bool,
    pub expected_error_contains: Option<String>,
}

/// Test suite containing multiple test cases
#[derive(Debug)]
pub struct TestSuite {
    pub name: String,
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tests: Vec::new(),
        }
    }

    pub fn add_test(&mut self, test: TestCase) {
        self.tests.push(test);
    }

    /// Run all tests in this suite
    pub fn run(&self) -> TestSuiteResults {
        let mut results = TestSuiteResults::new(&self.name);

        println!("Running test suite: {}", self.name);
        println!("{}", "=".repeat(50));

        for test in &self.tests {
            let result = run_single_test(test);
            results.add_result(&test.name, result);
        }

        results.print_summary();
        results
    }
}

/// Results for a test suite run
#[derive(Debug)]
pub struct TestSuiteResults {
    pub suite_name: String,
    pub results: Vec<(String, TestResult)>,
    pub passed: usize,
    pub failed: usize,
    pub crashed: usize,
}

impl TestSuiteResults {
    pub fn new(suite_name: &str) -> Self {
        Self {
            suite_name: suite_name.to_string(),
            results: Vec::new(),
            passed: 0,
            failed: 0,
            crashed: 0,
        }
    }

    pub fn add_result(&mut self, test_name: &str, result: TestResult) {
        match &result {
            TestResult::Pass => {
                self.passed += 1;
                println!("  ✓ {}", test_name);
            }
            TestResult::Fail(msg) => {
                self.failed += 1;
                println!("  ✗ {}: {}", test_name, msg);
            }
            TestResult::Crash(msg) => {
                self.crashed += 1;
                println!("  💥 {}: CRASHED - {}", test_name, msg);
            }
        }
        self.results.push((test_name.to_string(), result));
    }

    pub fn print_summary(&self) {
        println!();
        println!("Test Suite: {} - Summary", self.suite_name);
        println!("{}", "-".repeat(30));
        println!("Passed:  {}", self.passed);
        println!("Failed:  {}", self.failed);
        println!("Crashed: {}", self.crashed);
        println!("Total:   {}", self.results.len());
        println!();
    }

    pub fn is_all_passed(&self) -> bool {
        self.crashed == 0 && self.failed == 0
    }
}

/// Run a single test case
fn run_single_test(test: &TestCase) -> TestResult {
    // Catch any panics to detect crashes
    let result = std::panic::catch_unwind(|| parse_input(&test.input));

    match result {
        Ok(parse_result) => match (parse_result, test.should_succeed) {
            (Ok(_), true) => TestResult::Pass,
            (Ok(_), false) => {
                TestResult::Fail("Expected parsing to fail, but it succeeded".to_string())
            }
            (Err(errors), false) => {
                // Check if any error contains expected text
                if let Some(expected) = &test.expected_error_contains {
                    if errors.iter().any(|error| error.message.contains(expected)) {
                        TestResult::Pass
                    } else {
                        TestResult::Fail(format!(
                            "Errors {:?} don't contain expected text '{}'",
                            errors.iter().map(|e| &e.message).collect::<Vec<_>>(),
                            expected
                        ))
                    }
                } else {
                    TestResult::Pass // Any error is acceptable
                }
            }
            (Err(errors), true) => TestResult::Fail(format!(
                "Expected parsing to succeed, but got error: {}",
                errors[0].message
            )),
        },
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Unknown panic".to_string()
            };
            TestResult::Crash(panic_msg)
        }
    }
}

/// Parse input and return result
fn parse_input(input: &str) -> Result<Program, Vec<MonkeyError>> {
    let (program, errors) = monkey::parse(input);
    if errors.is_empty() {
        Ok(program)
    } else {
        Err(errors)
    }
}

/// Test case builder for convenience
impl TestCase {
    pub fn should_succeed(name: &str, input: &str) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            should_succeed: true,
            expected_error_contains: None,
        }
    }

    pub fn should_fail(name: &str, input: &str) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            should_succeed: false,
            expected_error_contains: None,
        }
    }

    pub fn should_fail_with_message(name: &str, input: &str, expected_msg: &str) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            should_succeed: false,
            expected_error_contains: Some(expected_msg.to_string()),
        }
    }
}

// ============================================================================
// Parser Suites
// ============================================================================

fn create_malformed_expressions_tests() -> TestSuite {
    let mut suite = TestSuite::new("Malformed Expressions");

    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_opening_paren",
        "(1 + 2",
        "expected next token to be ), got EOF instead",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_opening_paren_nested",
        "((1 + 2)",
        "expected next token to be ), got EOF instead",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_closing_paren",
        "1 + 2)",
        "no prefix parse function for ) found",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "empty_parentheses",
        "()",
        "no prefix parse function for ) found",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_opening_bracket",
        "[1, 2",
        "expected next token to be ], got EOF instead",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "brace_without_colon",
        "{ x = 1",
        "expected next token to be :, got = instead",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "assignment_is_not_an_expression",
        "x = 1",
        "no prefix parse function for = found",
    ));

    suite
}

fn create_edge_case_tests() -> TestSuite {
    let mut suite = TestSuite::new("Edge Cases");

    suite.add_test(TestCase::should_succeed("empty_input", ""));
    suite.add_test(TestCase::should_succeed("only_whitespace", "   \n\t  "));
    suite.add_test(TestCase::should_succeed("only_comment", "// nothing here"));
    suite.add_test(TestCase::should_fail("unexpected_eof_after_operator", "1 +"));
    suite.add_test(TestCase::should_fail("unexpected_eof_in_expression", "1 + ("));

    let deep_parens = "(".repeat(100) + "1" + &")".repeat(100);
    suite.add_test(TestCase::should_succeed("deeply_nested_parens", &deep_parens));

    let runaway_parens = "(".repeat(100_000) + "1" + &")".repeat(100_000);
    suite.add_test(TestCase::should_fail_with_message(
        "runaway_nested_parens",
        &runaway_parens,
        "nested more than",
    ));
    let runaway_prefix = "-".repeat(50_000) + "1";
    suite.add_test(TestCase::should_fail_with_message(
        "runaway_prefix_operators",
        &runaway_prefix,
        "nested more than",
    ));

    suite
}

fn create_operator_tests() -> TestSuite {
    let mut suite = TestSuite::new("Operator Tests");

    suite.add_test(TestCase::should_fail("missing_left_operand", "+ 1"));
    suite.add_test(TestCase::should_fail("missing_right_operand", "1 +"));
    suite.add_test(TestCase::should_fail("missing_both_operands", "+"));
    suite.add_test(TestCase::should_fail("double_plus", "1 ++ 2"));
    // Parsed as 1 - (-2) and 1 + (-2)
    suite.add_test(TestCase::should_succeed("double_minus", "1 -- 2"));
    suite.add_test(TestCase::should_succeed("mixed_operators", "1 +- 2"));

    suite.add_test(TestCase::should_succeed("comparison_equal", "1 == 2"));
    suite.add_test(TestCase::should_succeed("comparison_not_equal", "1 != 2"));
    suite.add_test(TestCase::should_succeed("comparison_less", "1 < 2"));
    suite.add_test(TestCase::should_succeed("comparison_greater", "1 > 2"));
    suite.add_test(TestCase::should_succeed("comparison_less_equal", "1 <= 2"));
    suite.add_test(TestCase::should_succeed("prefix_bang", "!!true"));

    suite
}

fn create_control_flow_tests() -> TestSuite {
    let mut suite = TestSuite::new("Control Flow Tests");

    suite.add_test(TestCase::should_succeed("valid_if", "if (true) { 1 }"));
    suite.add_test(TestCase::should_succeed("valid_if_else", "if (x) { 1 } else { 2 }"));
    suite.add_test(TestCase::should_succeed(
        "else_if_chain",
        "if (x) { 1 } else if (y) { 2 } else { 3 }",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "if_missing_parens",
        "if { 1 }",
        "expected next token to be (, got { instead",
    ));
    suite.add_test(TestCase::should_fail("if_missing_body", "if (true)"));
    suite.add_test(TestCase::should_fail("else_missing_body", "if (true) { 1 } else"));

    suite
}

fn create_literal_tests() -> TestSuite {
    let mut suite = TestSuite::new("Literal Tests");

    suite.add_test(TestCase::should_succeed("integer_literal", "42"));
    suite.add_test(TestCase::should_succeed("string_literal", "\"hello\""));
    suite.add_test(TestCase::should_succeed("boolean_true", "true"));
    suite.add_test(TestCase::should_succeed("boolean_false", "false"));

    suite.add_test(TestCase::should_fail_with_message(
        "integer_too_large",
        "99999999999999999999",
        "could not parse 99999999999999999999 as integer",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "unterminated_string",
        "\"hello",
        "unterminated string",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "illegal_character",
        "let a = 1 $ 2;",
        "illegal token '$'",
    ));

    suite
}

fn create_function_tests() -> TestSuite {
    let mut suite = TestSuite::new("Function Tests");

    suite.add_test(TestCase::should_succeed("empty_function", "fn() {}"));
    suite.add_test(TestCase::should_succeed("function_literal", "fn(x, y) { x + y }"));
    suite.add_test(TestCase::should_succeed("simple_function_call", "foo()"));
    suite.add_test(TestCase::should_succeed("function_call_with_args", "foo(1, 2, 3)"));
    suite.add_test(TestCase::should_succeed("immediate_call", "fn(x) { x }(5)"));

    suite.add_test(TestCase::should_fail("missing_closing_paren", "foo(1, 2"));
    suite.add_test(TestCase::should_fail("trailing_comma", "foo(1, 2,)"));
    suite.add_test(TestCase::should_fail_with_message(
        "non_identifier_parameter",
        "fn(1) {}",
        "expected next token to be IDENT, got INT instead",
    ));
    suite.add_test(TestCase::should_fail("trailing_comma_in_parameters", "fn(x, ) {}"));
    suite.add_test(TestCase::should_fail_with_message(
        "body_without_braces",
        "fn(x) x",
        "expected next token to be {, got IDENT instead",
    ));

    suite
}

fn create_statement_tests() -> TestSuite {
    let mut suite = TestSuite::new("Statement Tests");

    suite.add_test(TestCase::should_succeed("let_statement", "let x = 5;"));
    suite.add_test(TestCase::should_succeed("let_without_semicolon", "let x = 5"));
    suite.add_test(TestCase::should_succeed("return_statement", "return 5;"));

    suite.add_test(TestCase::should_fail_with_message(
        "let_missing_assign",
        "let x 5;",
        "expected next token to be =, got INT instead",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "let_missing_name",
        "let = 5;",
        "expected next token to be IDENT, got = instead",
    ));
    suite.add_test(TestCase::should_fail("let_missing_value", "let x ="));
    suite.add_test(TestCase::should_fail("return_without_value", "return;"));

    suite
}

fn create_collection_tests() -> TestSuite {
    let mut suite = TestSuite::new("Collection Tests");

    suite.add_test(TestCase::should_succeed("empty_array", "[]"));
    suite.add_test(TestCase::should_succeed("indexed_array", "[1, 2, 3][0]"));
    suite.add_test(TestCase::should_succeed("empty_hash", "{}"));
    suite.add_test(TestCase::should_succeed("string_keys", "{\"a\": 1}"));
    suite.add_test(TestCase::should_succeed("mixed_keys", "{1: 2, true: 3}"));

    suite.add_test(TestCase::should_fail("array_trailing_comma", "[1, 2,]"));
    suite.add_test(TestCase::should_fail_with_message(
        "hash_missing_colon",
        "{\"a\" 1}",
        "expected next token to be :, got INT instead",
    ));
    suite.add_test(TestCase::should_fail("hash_trailing_comma", "{\"a\": 1,}"));
    suite.add_test(TestCase::should_fail("index_missing_bracket", "a[1"));

    suite
}

#[test]
fn comprehensive_parser_tests() {
    let suites = vec![
        create_malformed_expressions_tests(),
        create_edge_case_tests(),
        create_operator_tests(),
        create_control_flow_tests(),
        create_literal_tests(),
        create_function_tests(),
        create_statement_tests(),
        create_collection_tests(),
    ];

    let mut failing_suites = Vec::new();
    for suite in suites {
        let results = suite.run();
        if !results.is_all_passed() {
            failing_suites.push(results.suite_name);
        }
    }

    assert!(failing_suites.is_empty(), "failing suites: {:?}", failing_suites);
}

#[test]
fn parser_collects_every_statement_error() {
    let (program, errors) = monkey::parse("let x 5; let = 10; let 838383;");
    assert!(program.statements.is_empty());
    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "expected next token to be =, got INT instead",
            "expected next token to be IDENT, got = instead",
            "expected next token to be IDENT, got INT instead",
        ]
    );
}

#[test]
fn parser_recovers_for_later_input() {
    let (_, errors) = monkey::parse("let x 5;");
    assert!(!errors.is_empty());

    let (program, errors) = monkey::parse("let x = 5; x * 2");
    assert!(errors.is_empty());
    assert_eq!(program.statements.len(), 2);
}

#[test]
fn tokenize_is_lazy_and_ends_with_eof() {
    let mut tokens = monkey::tokenize("let x = 1;");
    let first = tokens.next().expect("at least one token");
    assert_eq!(first.token_type, monkey::TokenType::Let);
    let rest: Vec<_> = tokens.map(|t| t.token_type).collect();
    assert_eq!(rest.last(), Some(&monkey::TokenType::Eof));
    assert_eq!(rest.len(), 5);
}

// ============================================================================
// Evaluation
// ============================================================================

fn eval_in(env: &monkey::Env, input: &str) -> Value {
    let (program, errors) = monkey::parse(input);
    assert!(errors.is_empty(), "parse errors for {:?}: {:?}", input, errors);
    monkey::evaluate(&program, env)
}

fn eval(input: &str) -> Value {
    eval_in(&Environment::new_global(), input)
}

fn error(message: &str) -> Value {
    Value::Error(message.to_string())
}

fn int_array(values: &[i64]) -> Value {
    Value::Array(Rc::new(values.iter().map(|v| Value::Integer(*v)).collect()))
}

#[test]
fn integer_literals_evaluate_to_themselves() {
    for n in [0, 7, 42, 1234567890, i64::MAX] {
        assert_eq!(eval(&n.to_string()), Value::Integer(n));
    }
}

#[test]
fn let_bindings_copy_values() {
    let env = Environment::new_global();
    assert_eq!(eval_in(&env, "let a = 5; let b = a; b;"), Value::Integer(5));
    assert_eq!(eval_in(&env, "let a = 10; b"), Value::Integer(5));
    assert_eq!(eval_in(&env, "a"), Value::Integer(10));
}

#[test]
fn closures_capture_their_environment() {
    assert_eq!(
        eval("let newAdder = fn(x) { fn(y) { x + y }; }; let addTwo = newAdder(2); addTwo(3);"),
        Value::Integer(5)
    );
    assert_eq!(
        eval(
            "let makeAdder = fn(x) { fn(y) { x + y } };
             let add1 = makeAdder(1);
             let add10 = makeAdder(10);
             add1(1) + add10(1)"
        ),
        Value::Integer(13)
    );
    // Captured by reference: a later binding in the same scope is seen.
    assert_eq!(
        eval("let x = 1; let f = fn() { x }; let x = 2; f()"),
        Value::Integer(2)
    );
}

#[test]
fn calls_use_the_defining_scope_not_the_callers() {
    assert_eq!(
        eval("let x = 1; let f = fn() { x }; let g = fn() { let x = 100; f() }; g()"),
        Value::Integer(1)
    );
    assert_eq!(
        eval("let f = fn(p) { p }; f(1); p"),
        error("identifier not found: p")
    );
}

#[test]
fn recursion_through_the_defining_environment() {
    assert_eq!(
        eval(
            "let factorial = fn(n) { if (n == 0) { 1 } else { n * factorial(n - 1) } };
             factorial(5);"
        ),
        Value::Integer(120)
    );
}

#[test]
fn deep_recursion_does_not_overflow_the_stack() {
    assert_eq!(
        eval(
            "let sum = fn(n) { if (n == 0) { 0 } else { n + sum(n - 1) } };
             sum(300);"
        ),
        Value::Integer(45150)
    );
}

#[test]
fn higher_order_functions() {
    assert_eq!(
        eval(
            "let map = fn(arr, f) {
                 let iter = fn(arr, acc) {
                     if (len(arr) == 0) { acc } else { iter(rest(arr), push(acc, f(first(arr)))) }
                 };
                 iter(arr, []);
             };
             map([1, 2, 3], fn(x) { x * 2 });"
        ),
        int_array(&[2, 4, 6])
    );
}

#[test]
fn runtime_faults_are_values() {
    assert_eq!(eval("5 / 0"), error("division by zero"));
    assert_eq!(eval("[1, 2, 3][10]"), Value::Null);
    assert_eq!(eval("[1, 2, 3][-1]"), Value::Null);
    assert_eq!(eval("{\"a\": 1}[\"b\"]"), Value::Null);
    assert_eq!(eval("{[1]: 2}"), error("unusable as hash key: ARRAY"));
    assert_eq!(eval("{\"a\": 1}[[1]]"), error("unusable as hash key: ARRAY"));
    assert_eq!(eval("{\"a\": 1}[fn(x) { x }]"), error("unusable as hash key: FUNCTION"));
    assert_eq!(eval("[1, 2, 3][\"a\"]"), error("index must be INTEGER, got STRING"));
    assert_eq!(eval("1[0]"), error("index operator not supported: INTEGER"));
    assert_eq!(eval("5(1)"), error("not a function: INTEGER"));
    assert_eq!(
        eval("fn(x) { x }(1, 2)"),
        error("wrong number of arguments: want=1, got=2")
    );
}

#[test]
fn errors_short_circuit_the_program() {
    let env = Environment::new_global();
    assert_eq!(
        eval_in(&env, "let f = fn() { 1 + true }; let x = f(); 5"),
        error("type mismatch: INTEGER + BOOLEAN")
    );
    assert_eq!(
        eval_in(&env, "x"),
        error("identifier not found: x")
    );
    assert!(eval_in(&env, "[1, 2 / 0, 3]").is_error());
}

#[test]
fn operator_precedence_evaluates() {
    assert_eq!(eval("1 + 2 * 3"), Value::Integer(7));
    assert_eq!(eval("(1 + 2) * 3"), Value::Integer(9));
    assert_eq!(eval("!true == false"), Value::Boolean(true));
}

#[test]
fn return_stops_at_the_function_boundary() {
    assert_eq!(
        eval("let f = fn(c) { if (c) { return 1; } return 2; }; f(true)"),
        Value::Integer(1)
    );
    assert_eq!(
        eval("let f = fn(c) { if (c) { return 1; } return 2; }; f(false) + 10"),
        Value::Integer(12)
    );
}

#[test]
fn reading_a_binding_twice_gives_the_same_value() {
    let env = Environment::new_global();
    eval_in(&env, "let h = {\"k\": [1, 2]};");
    assert_eq!(eval_in(&env, "h"), eval_in(&env, "h"));
}

#[test]
fn strings_and_hashes() {
    assert_eq!(
        eval("\"Hello\" + \" \" + \"World!\""),
        Value::String("Hello World!".to_string())
    );

    let env = Environment::new_global();
    eval_in(
        &env,
        "let two = \"two\";
         let h = {\"one\": 10 - 9, two: 1 + 1, \"thr\" + \"ee\": 6 / 2, 4: 4, true: 5, false: 6};",
    );
    assert_eq!(eval_in(&env, "h[\"one\"]"), Value::Integer(1));
    assert_eq!(eval_in(&env, "h[\"two\"]"), Value::Integer(2));
    assert_eq!(eval_in(&env, "h[\"three\"]"), Value::Integer(3));
    assert_eq!(eval_in(&env, "h[4]"), Value::Integer(4));
    assert_eq!(eval_in(&env, "h[true]"), Value::Integer(5));
    assert_eq!(eval_in(&env, "h[false]"), Value::Integer(6));
    assert_eq!(eval_in(&env, "len(h)"), Value::Integer(6));
}

#[test]
fn builtin_functions() {
    let cases = [
        ("len(\"\")", Value::Integer(0)),
        ("len(\"four\")", Value::Integer(4)),
        ("len(\"hello world\")", Value::Integer(11)),
        ("len([1, 2, 3])", Value::Integer(3)),
        ("len(1)", error("argument to `len` not supported, got INTEGER")),
        (
            "len(\"one\", \"two\")",
            error("wrong number of arguments: want=1, got=2"),
        ),
        ("first([1, 2, 3])", Value::Integer(1)),
        ("first([])", Value::Null),
        ("first(1)", error("argument to `first` must be ARRAY, got INTEGER")),
        ("last([1, 2, 3])", Value::Integer(3)),
        ("last([])", Value::Null),
        ("rest([1, 2, 3])", int_array(&[2, 3])),
        ("rest([])", Value::Null),
        ("push([], 1)", int_array(&[1])),
        ("push(1, 1)", error("argument to `push` must be ARRAY, got INTEGER")),
        ("puts(\"side effect\")", Value::Null),
        ("type(1)", Value::String("INTEGER".to_string())),
        ("type(len)", Value::String("BUILTIN".to_string())),
    ];
    for (input, expected) in cases {
        assert_eq!(eval(input), expected, "input: {}", input);
    }

    assert_eq!(
        eval("let a = [1]; let b = push(a, 2); len(a) + len(b)"),
        Value::Integer(3)
    );
    // User bindings shadow builtins.
    assert_eq!(eval("let len = fn(x) { 42 }; len([1])"), Value::Integer(42));
}

#[test]
fn values_render_for_the_repl() {
    let cases = [
        ("[1, \"a\", true]", "[1, \"a\", true]"),
        ("{\"a\": [1, 2]}", "{\"a\": [1, 2]}"),
        ("fn(x) { x + 2 }", "fn(x) { (x + 2) }"),
        ("len", "builtin function"),
        ("if (false) { 1 }", "null"),
        ("\"plain\"", "plain"),
        ("5 / 0", "ERROR: division by zero"),
    ];
    for (input, expected) in cases {
        assert_eq!(eval(input).to_string(), expected, "input: {}", input);
    }
}
