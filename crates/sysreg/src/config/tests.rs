//! Tests for configuration layering and validation

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use super::*;

fn no_env(_: &str) -> Option<String> {
    None
}

fn parse(text: &str) -> ConfigLayer {
    ConfigLayer::parse(text, Path::new("sysreg.toml")).expect("valid toml")
}

#[test]
fn test_defaults() {
    let options = RegistrationOptions::default();
    assert_eq!(options.register_name, None);
    assert!(options.systemjs_deps.is_empty());
    assert!(!options.minify);
    assert!(!options.use_systemjs_locate_dir);
    assert!(options.interop);
    assert_eq!(options.match_mode, MatchMode::Legacy);
    assert_eq!(options.stub_store, StubStoreKind::Virtual);
    assert_eq!(options.bootstrap_pattern, DEFAULT_BOOTSTRAP_PATTERN);
    options.validate().expect("defaults are valid");
}

#[test]
fn test_parse_full_file() {
    let layer = parse(
        r#"
registerName = "app"
systemjsDeps = ["react", { pattern = "@angular/.+" }]
minify = true
matchMode = "unified"
stubStore = "temp-dir"
entry = "./src/main.js"

[publicPath]
useSystemJSLocateDir = true
"#,
    );
    let options = RegistrationOptions::from_layer(layer);

    assert_eq!(options.register_name.as_deref(), Some("app"));
    assert_eq!(
        options.systemjs_deps,
        vec![
            DepRule::Literal("react".to_owned()),
            DepRule::Pattern {
                pattern: "@angular/.+".to_owned()
            },
        ]
    );
    assert!(options.minify);
    assert!(options.use_systemjs_locate_dir);
    assert_eq!(options.match_mode, MatchMode::Unified);
    assert_eq!(options.stub_store, StubStoreKind::TempDir);

    let validated = options.validate().expect("valid");
    assert!(validated.classifier.is_external("@angular/core"));
    assert!(!validated.classifier.is_external("not-@angular/core"));
    assert_eq!(validated.literal_dependencies().collect::<Vec<_>>(), ["react"]);
}

#[test]
fn test_dependency_list_must_be_an_array() {
    let err = ConfigLayer::parse(r#"systemjsDeps = "react""#, Path::new("bad.toml"))
        .expect_err("string is not an array");
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_unknown_keys_are_rejected() {
    let err = ConfigLayer::parse("registerNmae = \"app\"", Path::new("typo.toml"))
        .expect_err("typo must be reported");
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_public_path_requires_register_name() {
    let options = RegistrationOptions {
        use_systemjs_locate_dir: true,
        ..RegistrationOptions::default()
    };
    assert!(matches!(
        options.validate(),
        Err(ConfigError::PublicPathWithoutRegisterName)
    ));
}

#[test]
fn test_invalid_pattern_is_reported_with_index() {
    let options = RegistrationOptions {
        systemjs_deps: vec![
            DepRule::Literal("react".to_owned()),
            DepRule::Pattern {
                pattern: "(unclosed".to_owned(),
            },
        ],
        ..RegistrationOptions::default()
    };
    assert!(matches!(
        options.validate(),
        Err(ConfigError::InvalidPattern { index: 1, .. })
    ));
}

#[test]
fn test_empty_literal_is_rejected() {
    let options = RegistrationOptions {
        systemjs_deps: vec![DepRule::Literal(String::new())],
        ..RegistrationOptions::default()
    };
    assert!(matches!(
        options.validate(),
        Err(ConfigError::EmptyDependency { index: 0 })
    ));
}

#[test]
fn test_dependency_cannot_be_bundler_external() {
    let mut externals = IndexMap::new();
    externals.insert("react".to_owned(), "React".to_owned());
    let options = RegistrationOptions {
        systemjs_deps: vec![DepRule::Literal("react".to_owned())],
        externals,
        ..RegistrationOptions::default()
    };
    assert!(matches!(
        options.validate(),
        Err(ConfigError::ExternalCollision(ref name)) if name == "react"
    ));
}

#[test]
fn test_register_name_cannot_be_bundler_external() {
    let mut externals = IndexMap::new();
    externals.insert("app".to_owned(), "App".to_owned());
    let options = RegistrationOptions {
        register_name: Some("app".to_owned()),
        externals,
        ..RegistrationOptions::default()
    };
    assert!(matches!(
        options.validate(),
        Err(ConfigError::RegisterNameCollision(_))
    ));
}

#[test]
fn test_register_name_must_be_quotable() {
    for name in ["it's", "a\\b", "two\nlines"] {
        let options = RegistrationOptions {
            register_name: Some(name.to_owned()),
            ..RegistrationOptions::default()
        };
        assert!(
            matches!(options.validate(), Err(ConfigError::UnquotableRegisterName(_))),
            "{name:?} should be rejected"
        );
    }
}

#[test]
fn test_bootstrap_pattern_needs_target_group() {
    let options = RegistrationOptions {
        bootstrap_pattern: r"__webpack_require__\.p = .*;".to_owned(),
        ..RegistrationOptions::default()
    };
    assert!(matches!(
        options.validate(),
        Err(ConfigError::BootstrapPatternWithoutTarget(_))
    ));
}

#[test]
fn test_env_layer() {
    let env = |name: &str| match name {
        "SYSREG_REGISTER_NAME" => Some("from-env".to_owned()),
        "SYSREG_MINIFY" => Some("1".to_owned()),
        "SYSREG_DEPS" => Some("react, react-dom,,".to_owned()),
        _ => None,
    };
    let layer = ConfigLayer::from_env(env).expect("env layer");
    assert_eq!(layer.register_name.as_deref(), Some("from-env"));
    assert_eq!(layer.minify, Some(true));
    assert_eq!(
        layer.systemjs_deps,
        Some(vec![
            DepRule::Literal("react".to_owned()),
            DepRule::Literal("react-dom".to_owned()),
        ])
    );
}

#[test]
fn test_env_rejects_garbage_booleans() {
    let env = |name: &str| (name == "SYSREG_MINIFY").then(|| "perhaps".to_owned());
    assert!(matches!(
        ConfigLayer::from_env(env),
        Err(ConfigError::InvalidEnv {
            name: "SYSREG_MINIFY",
            ..
        })
    ));
}

#[test]
fn test_layer_precedence() {
    let temp = TempDir::new().expect("temp dir");
    let user = temp.path().join("user.toml");
    let project = temp.path().join("project.toml");
    fs::write(
        &user,
        "registerName = \"user\"\nminify = true\n[publicPath]\nbootstrapPattern = \"(?P<target>x)\"\n",
    )
    .expect("write user config");
    fs::write(
        &project,
        "registerName = \"project\"\nsystemjsDeps = [\"vue\"]\n[publicPath]\nuseSystemJSLocateDir = true\n",
    )
    .expect("write project config");

    let cli = ConfigLayer {
        systemjs_deps: Some(vec![DepRule::Literal("react".to_owned())]),
        ..ConfigLayer::default()
    };
    let options =
        RegistrationOptions::load_from(Some(user.as_path()), Some(project.as_path()), no_env, cli).expect("load");

    assert_eq!(options.register_name.as_deref(), Some("project"));
    assert!(options.minify, "user layer value survives when not overridden");
    assert!(options.use_systemjs_locate_dir);
    assert_eq!(options.bootstrap_pattern, "(?P<target>x)");
    assert_eq!(options.systemjs_deps, vec![DepRule::Literal("react".to_owned())]);
}

#[test]
fn test_missing_user_config_is_skipped() {
    let temp = TempDir::new().expect("temp dir");
    let options = RegistrationOptions::load_from(
        Some(temp.path().join("absent.toml").as_path()),
        None,
        no_env,
        ConfigLayer::default(),
    )
    .expect("load");
    assert_eq!(options, RegistrationOptions::default());
}

#[test]
fn test_missing_project_config_is_an_error() {
    let temp = TempDir::new().expect("temp dir");
    let err = RegistrationOptions::load_from(
        None,
        Some(temp.path().join("absent.toml").as_path()),
        no_env,
        ConfigLayer::default(),
    )
    .expect_err("explicit config must exist");
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_configured_patterns_match_whole_requests() {
    let validated = RegistrationOptions {
        systemjs_deps: vec![DepRule::Pattern {
            pattern: "react".to_owned(),
        }],
        ..RegistrationOptions::default()
    }
    .validate()
    .expect("valid");
    assert!(validated.classifier.is_external("react"));
    assert!(!validated.classifier.is_external("preact-compat"));
    assert!(!validated.classifier.is_external("react-dom/server"));
}
