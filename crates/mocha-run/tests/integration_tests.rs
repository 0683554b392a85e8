use assert_cmd::cargo;
use rstest::rstest;
use scopeguard::defer;
use std::io::Write;
use std::{fs::File, path::PathBuf};

pub fn create_file(name: &str, content: &str) -> PathBuf {
    let temp_file_path = std::env::temp_dir().join(name);
    let mut file = File::create(&temp_file_path).expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write to temp file");

    temp_file_path
}

#[rstest]
#[case::arithmetic(vec!["1 + 2 * 3"], "7\n")]
#[case::fraction(vec!["1 / 4"], "0.25\n")]
#[case::division_by_zero(vec!["1 / 0"], "0\n")]
#[case::math(vec!["math.sqrt(16) + math.abs(-1)"], "5\n")]
#[case::set_variable(vec!["--set", "v.speed=2.5", "v.speed * 2"], "5\n")]
#[case::set_array(vec!["--set", "c.list=1,2,3", "t.sum = 0; for_each(t.x, c.list, { t.sum = t.sum + t.x }); t.sum"], "6\n")]
#[case::this(vec!["--this", "-3", "this * 2"], "-6\n")]
#[case::loop_return(vec!["temp.x = 0; loop(5, {temp.x = temp.x + 1}); return temp.x;"], "5\n")]
#[case::max_loop(vec!["--max-loop", "3", "t.i = 0; loop(100, { t.i = t.i + 1 })"], "3\n")]
#[case::no_optimize(vec!["--no-optimize", "false && (1 / 0)"], "0\n")]
#[case::repeat(vec!["--repeat", "3", "v.n = v.n + 1"], "1\n2\n3\n")]
#[case::ast(vec!["--ast", "v.x = 1 + 2 * 3"], "v.x = 1 + (2 * 3)\n")]
fn test_cli_run(#[case] args: Vec<&str>, #[case] expected: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = cargo::cargo_bin_cmd!("mocha");
    let assert = cmd.args(args).assert();
    assert.success().code(0).stdout(expected.to_string());

    Ok(())
}

#[test]
fn test_cli_run_with_file() -> Result<(), Box<dyn std::error::Error>> {
    let path = create_file("test_cli_run_with_file.molang", "v.a = 2;\nv.a * v.a");
    let path_clone = path.clone();
    defer! {
        if path_clone.exists() {
            std::fs::remove_file(&path_clone).expect("Failed to delete temp file");
        }
    }

    let mut cmd = cargo::cargo_bin_cmd!("mocha");
    let assert = cmd.arg("-f").arg(path.to_string_lossy().to_string()).assert();
    assert.success().code(0).stdout("4\n");

    Ok(())
}

#[rstest]
#[case::arity_mismatch(vec!["math.abs(1, 2)"])]
#[case::syntax_error(vec!["1 +"])]
#[case::unknown_namespace(vec!["nope.x"])]
#[case::bad_set(vec!["--set", "speed=1", "1"])]
#[case::missing_file(vec!["-f", "/nonexistent/expression.molang"])]
fn test_cli_errors(#[case] args: Vec<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = cargo::cargo_bin_cmd!("mocha");
    cmd.args(args).assert().failure();

    Ok(())
}
