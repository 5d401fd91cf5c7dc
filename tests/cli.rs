use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use clap::Parser;
use predicates::prelude::*;
use stitch::cli::{Cli, Commands};

const APP_CONFIG: &str = r#"
input_dir = "src"
output_dir = "dist"

[[units]]
output_file = "app.js"
inputs = ["**/*.js"]
header = "// bundle"
"#;

fn stitch(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stitch").unwrap();
    cmd.current_dir(dir.path()).env_remove("STITCH_LOG");
    cmd
}

fn app_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    dir.child("stitch.toml").write_str(APP_CONFIG).unwrap();
    dir.child("src/a.js").write_str("//a\n").unwrap();
    dir.child("src/b.js").write_str("//b\n").unwrap();
    dir
}

#[test]
fn watch_flags_parse() {
    // Given
    let argv = vec![
        "stitch",
        "--quiet",
        "watch",
        "--config",
        "conf/stitch.toml",
        "--unit",
        "app.js",
        "--unit",
        "vendor.js",
        "--debounce-ms",
        "250",
        "--no-source-maps",
    ];

    // When
    let cli = Cli::parse_from(argv);

    // Then
    assert!(cli.context().quiet);
    match cli.command {
        Commands::Watch(args) => {
            assert_eq!(args.debounce_ms, 250);
            assert_eq!(args.build.units, ["app.js", "vendor.js"]);
            assert!(args.build.no_source_maps);
            let config = args.build.config.expect("config flag should be captured");
            assert!(config.ends_with("conf/stitch.toml"));
        }
        _ => panic!("expected Watch command"),
    }
}

#[test]
fn quiet_conflicts_with_verbose() {
    let parsed = Cli::try_parse_from(["stitch", "build", "--quiet", "--verbose"]);
    assert!(parsed.is_err());
}

#[test]
fn build_writes_output_and_map() {
    let dir = app_project();

    stitch(&dir)
        .args(["--no-color", "build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote").and(predicate::str::contains("app.map")));

    dir.child("dist/app.js")
        .assert("// bundle\n//a\n\n//b\n//# sourceMappingURL=app.map\n");

    let map: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.child("dist/app.map").path()).unwrap())
            .unwrap();
    insta::assert_json_snapshot!(map, @r#"
    {
      "file": "app.js",
      "mappings": ";AAAA;;ACAA;",
      "names": [],
      "sources": [
        "a.js",
        "b.js"
      ],
      "sourcesContent": [
        "//a\n",
        "//b\n"
      ],
      "version": 3
    }
    "#);
}

#[test]
fn dry_run_writes_nothing() {
    let dir = app_project();

    stitch(&dir)
        .args(["--no-color", "--dry-run", "build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would write"));

    dir.child("dist").assert(predicate::path::missing());
}

#[test]
fn unmatched_inputs_fail() {
    let dir = TempDir::new().unwrap();
    dir.child("stitch.toml")
        .write_str(&APP_CONFIG.replace("**/*.js", "**/*.ts"))
        .unwrap();
    dir.child("src/a.js").write_str("//a\n").unwrap();

    stitch(&dir)
        .args(["--no-color", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing matched"));

    dir.child("dist/app.js").assert(predicate::path::missing());
}

#[test]
fn plain_units_get_no_map() {
    let dir = TempDir::new().unwrap();
    dir.child("stitch.toml")
        .write_str(
            r#"
output_dir = "out"

[[units]]
output_file = "styles.css"
inputs = ["css/*.css"]
"#,
        )
        .unwrap();
    dir.child("css/a.css").write_str("a {}\n").unwrap();
    dir.child("css/b.css").write_str("b {}\n").unwrap();

    stitch(&dir).args(["--quiet", "build"]).assert().success();

    dir.child("out/styles.css").assert("a {}\n\nb {}\n");
    dir.child("out/styles.map").assert(predicate::path::missing());
}

#[test]
fn unit_filter_selects_outputs() {
    let dir = app_project();
    dir.child("stitch.toml")
        .write_str(&format!(
            "{APP_CONFIG}\n[[units]]\noutput_file = \"other.js\"\ninputs = [\"a.js\"]\n"
        ))
        .unwrap();

    stitch(&dir)
        .args(["--quiet", "build", "--unit", "other.js"])
        .assert()
        .success();

    dir.child("dist/other.js").assert(predicate::path::exists());
    dir.child("dist/app.js").assert(predicate::path::missing());
}

#[test]
fn init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();

    stitch(&dir).arg("init").assert().success();
    dir.child("stitch.toml")
        .assert(predicate::str::contains("[[units]]").and(predicate::str::contains("app.js")));

    stitch(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    stitch(&dir).args(["init", "--force"]).assert().success();
}
