/// End-to-end tests: drive the built `nodegen` binary.
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn sample_schema() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../schema/nesc.nodes")
}

fn nodegen(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nodegen"))
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .unwrap()
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn test_check_sample_schema() {
    let dir = tempfile::tempdir().unwrap();
    let schema = sample_schema();
    let out = nodegen(dir.path(), &["check", "-i", schema.to_str().unwrap()]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stdout(&out).contains("34 classes"), "{}", stdout(&out));
}

#[test]
fn test_check_reports_schema_errors() {
    let dir = tempfile::tempdir().unwrap();
    let schema = dir.path().join("bad.nodes");
    std::fs::write(&schema, "node A : Missing {}\nnode B {\n    x: Nowhere\n}\n").unwrap();

    let out = nodegen(dir.path(), &["check", "-i", "bad.nodes"]);
    assert!(!out.status.success());
    let err = stderr(&out);
    assert!(err.contains("cannot resolve bad.nodes"), "{err}");
    assert!(err.contains("UNRESOLVED_SUPERCLASS"), "{err}");
}

#[test]
fn test_check_reports_syntax_errors() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad.nodes"), "node A {\n    x string\n}\n").unwrap();

    let out = nodegen(dir.path(), &["check", "-i", "bad.nodes"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("bad.nodes:line 2"), "{}", stderr(&out));
}

#[test]
fn test_inspect_one_class() {
    let dir = tempfile::tempdir().unwrap();
    let schema = sample_schema();
    let schema = schema.to_str().unwrap();

    let out = nodegen(dir.path(), &["inspect", "-i", schema, "--class", "Identifier"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let text = stdout(&out);
    assert!(
        text.starts_with("class Identifier : Expression #generic #mangle(uniqueName, refsDeclInThisNescEntity)\n"),
        "{text}"
    );
    assert!(text.contains("  chain: Node > Expression > Identifier\n"), "{text}");
    assert!(text.contains("next=reset"), "{text}");
    assert!(!text.contains("class Module"));

    let out = nodegen(dir.path(), &["inspect", "-i", schema, "--class", "Nope"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("no class named 'Nope'"));
}

#[test]
fn test_generate_selected_target() {
    let dir = tempfile::tempdir().unwrap();
    let schema = sample_schema();
    let out = nodegen(
        dir.path(),
        &["generate", "-i", schema.to_str().unwrap(), "-o", "out", "-t", "rust"],
    );
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(dir.path().join("out/nodes.rs").exists());
    assert!(!dir.path().join("out/model.json").exists());

    let out = nodegen(
        dir.path(),
        &["generate", "-i", schema.to_str().unwrap(), "-o", "out", "-t", "cobol"],
    );
    assert!(!out.status.success());
    assert!(stderr(&out).contains("unsupported target: cobol"));
}

#[test]
fn test_config_supplies_root_externals_and_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("nodegen.toml"),
        "root = \"Base\"\nexternals = [\"Location\"]\n\n[output]\ndir = \"gen\"\ntargets = [\"json\"]\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("ast.nodes"), "node Node : Base {\n    location: Location\n}\n").unwrap();

    let out = nodegen(dir.path(), &["generate", "-i", "ast.nodes"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let json = std::fs::read_to_string(dir.path().join("gen/model.json")).unwrap();
    assert!(json.contains("\"root\": \"Base\""), "{json}");
    assert!(json.contains("\"externals\": [\n    \"Location\"\n  ]"), "{json}");
    assert!(!dir.path().join("gen/nodes.rs").exists());

    // An explicit config file must exist.
    let out = nodegen(dir.path(), &["--config", "other.toml", "check", "-i", "ast.nodes"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("other.toml"));
}
