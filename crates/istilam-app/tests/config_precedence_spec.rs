//! Configuration layering: built-in defaults, then the optional settings
//! file in the working directory, then `ISTILAM`-prefixed environment
//! variables.

use std::{
    env,
    ffi::{OsStr, OsString},
    fs,
    sync::{Mutex, OnceLock},
};

use tempfile::TempDir;

use istilam_app::config;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("config env mutex poisoned")
}

fn snapshot_env(vars: &[&'static str]) -> Vec<(&'static str, Option<OsString>)> {
    vars.iter().map(|&name| (name, env::var_os(name))).collect()
}

fn restore_env(vars: Vec<(&'static str, Option<OsString>)>) {
    for (name, value) in vars {
        match value {
            Some(val) => set_var(name, val),
            None => remove_var(name),
        }
    }
}

fn set_var(name: &str, value: impl AsRef<OsStr>) {
    unsafe { env::set_var(name, value) }
}

fn remove_var(name: &str) {
    unsafe { env::remove_var(name) }
}

const TRACKED: &[&'static str] = &[
    "ISTILAM__SERVER__LISTEN_ADDR",
    "ISTILAM__PORTAL__URL",
    "ISTILAM__PORTAL__HEADLESS",
    "ISTILAM__CLASSIFIER__MIN_CORE_FIELDS",
];

#[test]
fn defaults_apply_when_nothing_is_configured() {
    let _guard = env_guard();
    let env_snapshot = snapshot_env(TRACKED);
    for name in TRACKED {
        remove_var(name);
    }
    let original_dir = env::current_dir().expect("capture current dir");
    let scratch = TempDir::new().expect("scratch dir");
    env::set_current_dir(scratch.path()).expect("enter scratch dir");

    let cfg = config::load().expect("load defaults");
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:3000");
    assert!(cfg.portal.url.contains("moi.gov.kw"));
    assert!(cfg.portal.headless);
    assert_eq!(cfg.classifier.min_core_fields, 1);

    env::set_current_dir(original_dir).expect("restore current dir");
    restore_env(env_snapshot);
}

#[test]
fn environment_overrides_the_settings_file() {
    let _guard = env_guard();
    let env_snapshot = snapshot_env(TRACKED);
    for name in TRACKED {
        remove_var(name);
    }
    let original_dir = env::current_dir().expect("capture current dir");
    let scratch = TempDir::new().expect("scratch dir");
    fs::create_dir(scratch.path().join("config")).expect("config dir");
    fs::write(
        scratch.path().join("config").join("settings.toml"),
        "[server]\nlisten_addr = \"0.0.0.0:8000\"\n\n[portal]\nheadless = false\n",
    )
    .expect("write settings file");
    env::set_current_dir(scratch.path()).expect("enter scratch dir");

    // File values beat defaults.
    let cfg = config::load().expect("load from file");
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:8000");
    assert!(!cfg.portal.headless);
    assert_eq!(cfg.classifier.min_core_fields, 1);

    // Environment beats the file.
    set_var("ISTILAM__SERVER__LISTEN_ADDR", "127.0.0.1:9000");
    set_var("ISTILAM__CLASSIFIER__MIN_CORE_FIELDS", "2");
    let cfg = config::load().expect("load with env overrides");
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:9000");
    assert!(!cfg.portal.headless);
    assert_eq!(cfg.classifier.min_core_fields, 2);

    env::set_current_dir(original_dir).expect("restore current dir");
    restore_env(env_snapshot);
}
