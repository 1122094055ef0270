use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, ensure};
use futures::executor::block_on;

use formbasic::fixtures::{CaseClass, load_cases, normalize_output};
use formbasic::host::ScriptedHost;
use formbasic::interpreter::Interpreter;
use formbasic::parser::parse_handler_code;
use formbasic::runtime::RuntimeContext;

#[test]
fn runs_script_cases() -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;

    for case in cases {
        let source = fs::read_to_string(&case.program_path)
            .with_context(|| format!("Reading {}", case.name))?;
        let parsed = parse_handler_code(&source);

        match case.spec.class {
            CaseClass::RuntimeSuccess => {
                let block = parsed
                    .map_err(|error| anyhow::anyhow!("{error}"))
                    .with_context(|| format!("Parsing {}", case.name))?;

                let host = Rc::new(ScriptedHost::new());
                for input in &case.spec.inputs {
                    host.push_input(input.clone());
                }
                let ctx = Rc::new(RefCell::new(RuntimeContext::new()));
                let interpreter = Interpreter::new(ctx, host.clone());
                block_on(interpreter.execute_block(&block))
                    .with_context(|| format!("Running {}", case.name))?;

                let stdout_file = case
                    .spec
                    .expected
                    .stdout_file
                    .as_deref()
                    .with_context(|| format!("Missing stdout_file in {}", case.name))?;
                let expected = case.read_text(stdout_file)?;
                assert_eq!(
                    normalize_output(&host.output()),
                    normalize_output(&expected),
                    "Output mismatch for {}",
                    case.name
                );
                ensure!(
                    host.errors().is_empty(),
                    "Case {} reported errors: {:?}",
                    case.name,
                    host.errors()
                );
            }
            CaseClass::ParseError => {
                let expected_file = case
                    .spec
                    .expected
                    .error_contains_file
                    .as_deref()
                    .with_context(|| format!("Missing error_contains_file in {}", case.name))?;
                let expected_error = case.read_text(expected_file)?;
                let expected_error = expected_error.trim();
                let error = match parsed {
                    Err(error) => error.to_string(),
                    Ok(_) => anyhow::bail!("Expected parse error in {}, but parsing succeeded", case.name),
                };
                ensure!(
                    error.contains(expected_error),
                    "Expected parse error containing '{expected_error}' in {}, got '{error}'",
                    case.name
                );
            }
        }
    }

    Ok(())
}
