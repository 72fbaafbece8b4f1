use autoclap::{
    describe, Command, CommandOptions, InvocationError, ParamSpec, Registry, Signature, TypeExpr,
};
use autoclap_library::converters::{DelimitedList, Positive};
use autoclap_library::logging::{LogLevel, LogSettings};
use autoclap_library::paths::{PathType, ReadableFile, WritableDir};
use autoclap_library::validators::{Defined, Mutex as Exclusive};
use rstest::rstest;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn installed() -> Registry {
    let mut registry = Registry::new();
    autoclap_library::install(&mut registry).unwrap();
    registry
}

fn counting(command: Command, calls: Arc<AtomicUsize>) -> Command {
    command.with_callback(move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[test]
fn test_missing_readable_file_fails_before_callback() {
    let registry = installed();
    let calls = Arc::new(AtomicUsize::new(0));
    let command = counting(
        Command::command(
            &registry,
            &Signature::new("cat").param(ParamSpec::new("input").typed(ReadableFile::type_expr())),
            &CommandOptions::new(),
        )
        .unwrap(),
        calls.clone(),
    );

    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.txt");
    let err = command
        .try_invoke([missing.to_string_lossy().to_string()])
        .unwrap_err();
    assert!(matches!(err, InvocationError::Validation(_)));
    assert!(err.to_string().contains("does not exist"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let present = dir.path().join("present.txt");
    std::fs::write(&present, "hello").unwrap();
    let invocation = command
        .try_invoke([present.to_string_lossy().to_string()])
        .unwrap();
    let input: ReadableFile = invocation.get_as("input").unwrap();
    assert_eq!(input.as_path(), present.as_path());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_declared_path_type_resolves_by_name() {
    let registry = installed();
    let command = Command::command(
        &registry,
        &Signature::new("save").param(
            ParamSpec::new("out")
                .typed(TypeExpr::forward("WritableDir"))
                .default("."),
        ),
        &CommandOptions::new(),
    )
    .unwrap();

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("file");
    std::fs::write(&file, "").unwrap();
    let err = command
        .try_invoke(["--out".to_string(), file.to_string_lossy().to_string()])
        .unwrap_err();
    assert!(err.to_string().contains("exists and is not a directory"));

    let invocation = command
        .try_invoke(["--out".to_string(), dir.path().to_string_lossy().to_string()])
        .unwrap();
    let out: WritableDir = invocation.get_as("out").unwrap();
    assert_eq!(out.as_path(), dir.path());
}

#[test]
fn test_log_settings_composite() {
    let registry = installed();
    let command = Command::command(
        &registry,
        &Signature::new("serve")
            .param(ParamSpec::new("log").typed(TypeExpr::named::<LogSettings>())),
        &CommandOptions::new().add_composite_prefixes(false),
    )
    .unwrap();

    let description = describe(&command);
    assert!(description.option("log_name").unwrap().hidden);
    assert!(!description.option("log_level").unwrap().hidden);
    assert_eq!(description.option("log_level").unwrap().default, Some(json!("warn")));

    let invocation = command.try_invoke(["--log-level", "DEBUG"]).unwrap();
    let log: LogSettings = invocation.get_as("log").unwrap();
    assert_eq!(log.log_level, LogLevel::Debug);
    assert_eq!(log.log_file, None);
    assert_eq!(log.directive(), "debug");

    let err = command.try_invoke(["--log-level", "loud"]).unwrap_err();
    assert!(err.is_usage_error());
}

#[rstest]
#[case(&["--tags", "a, b"], Some(json!(["a", "b"])))]
#[case(&["--tags", ""], Some(json!([])))]
#[case(&["--retries=-1"], None)]
fn test_library_converters(#[case] args: &[&str], #[case] tags: Option<Value>) {
    let registry = installed();
    let command = Command::command(
        &registry,
        &Signature::new("tag")
            .param(ParamSpec::new("tags").typed(TypeExpr::string()).default(""))
            .param(ParamSpec::new("retries").typed(TypeExpr::int()).default(0)),
        &CommandOptions::new().with_common(|common| {
            common
                .converter("tags", Arc::new(DelimitedList::new().strip(true)))
                .converter("retries", Arc::new(Positive::int()))
        }),
    )
    .unwrap();

    match tags {
        Some(expected) => {
            let invocation = command.try_invoke(args.iter().copied()).unwrap();
            assert_eq!(invocation.get("tags"), Some(&expected));
        }
        None => {
            let err = command.try_invoke(args.iter().copied()).unwrap_err();
            assert!(matches!(err, InvocationError::Conversion { .. }));
        }
    }
}

#[test]
fn test_group_validators() {
    let registry = installed();
    let signature = Signature::new("fetch")
        .param(
            ParamSpec::new("url")
                .typed(TypeExpr::optional(TypeExpr::string()))
                .default(Value::Null),
        )
        .param(
            ParamSpec::new("file")
                .typed(TypeExpr::optional(TypeExpr::string()))
                .default(Value::Null),
        );
    let command = Command::command(
        &registry,
        &signature,
        &CommandOptions::new().with_common(|common| {
            common
                .validation_fn(["url", "file"], Exclusive::new().into_validation())
                .validation_fn(["url", "file"], Defined::at_least(1).into_validation())
        }),
    )
    .unwrap();

    assert!(command.try_invoke(["--url", "http://x"]).is_ok());
    let err = command
        .try_invoke(["--url", "http://x", "--file", "x.txt"])
        .unwrap_err();
    assert!(err.to_string().contains("mutually exclusive"));
    let err = command.try_invoke(Vec::<String>::new()).unwrap_err();
    assert!(err.to_string().contains("the number defined must be >= 1"));
}
