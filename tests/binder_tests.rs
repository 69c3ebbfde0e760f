//! Argument binding through the module registry

use proptest::prelude::*;
use rustle_modules::modules::core::{CopyCommand, ServiceCommand, ShellCommand};
use rustle_modules::{CommandSpec, ConversionError, ModuleError, ModuleRegistry};
use serde_json::{json, Value};

fn convert(module: &str, args: Value) -> Result<rustle_modules::Command, ModuleError> {
    ModuleRegistry::default().convert(module, &args)
}

fn conversion_error(module: &str, args: Value) -> ConversionError {
    match convert(module, args) {
        Err(ModuleError::Conversion(e)) => e,
        other => panic!("expected a conversion error, got {other:?}"),
    }
}

#[test]
fn test_shell_binding() {
    let command = convert(
        "shell",
        json!({
            "exec": "systemctl status {{ item }}",
            "RunAs": "deploy",
            "asroot": "false",
            "saveState": "status",
            "withVars": ["env"],
            "withList": ["nginx", "redis"]
        }),
    )
    .unwrap();

    assert_eq!(command.kind(), "shell");
    assert_eq!(
        command.spec(),
        &CommandSpec::Shell(ShellCommand {
            exec: "systemctl status {{ item }}".to_string(),
            run_as: Some("deploy".to_string()),
            as_root: false,
            save_state: Some("status".to_string()),
        })
    );
    assert_eq!(command.with_vars(), ["env"]);
    assert_eq!(command.with_list(), ["nginx", "redis"]);
    assert_eq!(command.save_state(), Some("status"));
}

#[test]
fn test_copy_binding_with_defaults() {
    let command = convert("copy", json!({"srcDir": "/a", "destDir": "/b"})).unwrap();
    assert_eq!(
        command.spec(),
        &CommandSpec::Copy(CopyCommand {
            source: "/a".to_string(),
            destination: "/b".to_string(),
            mode: 0o664,
            create_destination: false,
        })
    );
    assert_eq!(command.save_state(), None);
}

#[test]
fn test_copy_binding_perm_and_flag() {
    let command = convert(
        "copy",
        json!({"srcDir": "/a", "destDir": "/b", "perm": "0755", "createIfMissing": true}),
    )
    .unwrap();
    match command.spec() {
        CommandSpec::Copy(copy) => {
            assert_eq!(copy.mode, 0o755);
            assert!(copy.create_destination);
        }
        other => panic!("unexpected spec {other:?}"),
    }
}

#[test]
fn test_service_binding() {
    let command = convert("service", json!({"name": "nginx", "state": "started"})).unwrap();
    assert_eq!(
        command.spec(),
        &CommandSpec::Service(ServiceCommand {
            name: "nginx".to_string(),
            state: "started".to_string(),
        })
    );
}

#[test]
fn test_missing_required_arguments() {
    assert_eq!(
        conversion_error("shell", json!({"runAs": "root"})),
        ConversionError::MissingRequiredArgument {
            kind: "shell".to_string(),
            key: "exec".to_string()
        }
    );
    assert_eq!(
        conversion_error("copy", json!({"srcDir": "/a"})),
        ConversionError::MissingRequiredArgument {
            kind: "copy".to_string(),
            key: "destDir".to_string()
        }
    );
    assert_eq!(
        conversion_error("service", json!({"name": "nginx"})),
        ConversionError::MissingRequiredArgument {
            kind: "service".to_string(),
            key: "state".to_string()
        }
    );
}

#[test]
fn test_unknown_argument() {
    assert_eq!(
        conversion_error("service", json!({"name": "nginx", "state": "started", "enabled": true})),
        ConversionError::UnknownArgument {
            kind: "service".to_string(),
            key: "enabled".to_string()
        }
    );
}

#[test]
fn test_type_mismatches() {
    assert_eq!(
        conversion_error("shell", json!({"exec": "ls", "asRoot": 1})),
        ConversionError::ArgumentTypeMismatch {
            kind: "shell".to_string(),
            key: "asRoot".to_string(),
            got: "number".to_string(),
            want: "bool or string".to_string()
        }
    );
    assert!(matches!(
        conversion_error("copy", json!({"srcDir": ["/a"], "destDir": "/b"})),
        ConversionError::ArgumentTypeMismatch { key, .. } if key == "srcDir"
    ));
    assert!(matches!(
        conversion_error("shell", json!({"exec": "ls", "withVars": "name"})),
        ConversionError::ArgumentTypeMismatch { key, .. } if key == "withVars"
    ));
}

#[test]
fn test_invalid_perm() {
    assert!(matches!(
        conversion_error("copy", json!({"srcDir": "/a", "destDir": "/b", "perm": "rwxr-xr-x"})),
        ConversionError::InvalidArgumentValue { key, .. } if key == "perm"
    ));
}

#[test]
fn test_bag_is_not_a_map() {
    assert!(matches!(
        conversion_error("shell", json!("echo hi")),
        ConversionError::InvalidArgumentBag { .. }
    ));
}

#[test]
fn test_each_binding_gets_fresh_identity() {
    let args = json!({"exec": "ls"});
    let first = convert("shell", args.clone()).unwrap();
    let second = convert("shell", args).unwrap();
    assert_ne!(first.id(), second.id());
    assert_ne!(first, second);
}

#[test]
fn test_round_trip_through_argument_bag() {
    let bags = [
        (
            "shell",
            json!({"exec": "echo {{ item }}", "asRoot": true, "saveState": "out", "withList": ["a"]}),
        ),
        (
            "copy",
            json!({"srcDir": "/src/{{ item }}", "destDir": "/dest", "perm": "0600", "withList": ["x", "y"], "withVars": ["v"]}),
        ),
        ("service", json!({"name": "sshd", "state": "restarted"})),
    ];

    for (module, args) in bags {
        let original = convert(module, args).unwrap();
        let rebound = convert(module, original.to_argument_bag()).unwrap();
        assert_eq!(rebound.spec(), original.spec());
        assert_eq!(rebound.with_vars(), original.with_vars());
        assert_eq!(rebound.with_list(), original.with_list());
    }
}

proptest! {
    #[test]
    fn prop_unrecognised_key_always_rejected(key in "[a-z]{3,12}") {
        let known = ["exec", "runas", "asroot", "savestate", "withvars", "withlist"];
        prop_assume!(!known.contains(&key.as_str()));

        let mut args = serde_json::Map::new();
        args.insert("exec".to_string(), json!("ls"));
        args.insert(key.clone(), json!("x"));

        let err = conversion_error("shell", Value::Object(args));
        prop_assert_eq!(
            err,
            ConversionError::UnknownArgument { kind: "shell".to_string(), key }
        );
    }

    #[test]
    fn prop_list_order_preserved(items in proptest::collection::vec("[a-z0-9]{1,8}", 0..8)) {
        let command = convert(
            "shell",
            json!({"exec": "echo {{ item }}", "withList": items.clone()}),
        )
        .unwrap();
        prop_assert_eq!(command.with_list(), items.as_slice());
    }
}
