//! End-to-end runs against fake homes and replayed tool transcripts

use orapatch_engine::logging::{LogLevel, LoggingService, MemoryLogger};
use orapatch_engine::{
    Credential, EnginePreferences, Function, PatchEngine, RunRequest, ScriptedExecutor, Sleeper,
};
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingSleeper {
    naps: Mutex<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.naps.lock().unwrap().push(duration);
    }
}

struct Fixture {
    dir: TempDir,
    home: PathBuf,
    oratab: PathBuf,
}

impl Fixture {
    fn new(version: u32, grid: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        fs::create_dir_all(home.join("lib")).unwrap();
        fs::create_dir_all(home.join("bin")).unwrap();
        fs::write(home.join("lib").join(format!("libcell{}.so", version)), "").unwrap();
        if grid {
            fs::write(home.join("bin").join("ohasd.bin"), "").unwrap();
        }

        let inventory = dir.path().join("oraInventory");
        fs::create_dir_all(inventory.join("ContentsXML")).unwrap();
        fs::write(
            inventory.join("ContentsXML").join("inventory.xml"),
            format!(
                r#"<?xml version="1.0" standalone="yes" ?>
<INVENTORY>
<HOME_LIST>
<HOME NAME="OraHome1" LOC="{}" TYPE="O" IDX="1"{}/>
</HOME_LIST>
</INVENTORY>"#,
                home.display(),
                if grid { r#" CRS="true""# } else { "" }
            ),
        )
        .unwrap();
        fs::write(
            home.join("oraInst.loc"),
            format!("inventory_loc={}\ninst_group=oinstall\n", inventory.display()),
        )
        .unwrap();

        let oratab = dir.path().join("oratab");
        fs::write(&oratab, "# oratab\n").unwrap();

        Self { dir, home, oratab }
    }

    fn with_oratab(self, sid: &str) -> Self {
        fs::write(&self.oratab, format!("{}:{}:N\n", sid, self.home.display())).unwrap();
        self
    }

    fn cluster_member(self) -> Self {
        fs::write(self.home.join("bin").join("cemutlo.bin"), "").unwrap();
        self
    }

    fn home(&self) -> String {
        self.home.display().to_string()
    }

    fn stage(&self) -> String {
        self.dir.path().join("stage").display().to_string()
    }

    fn preferences(&self) -> EnginePreferences {
        EnginePreferences::default()
            .with_orainst_loc(self.dir.path().join("missing-oraInst.loc"))
            .with_olr_loc(self.dir.path().join("olr.loc"))
            .with_response_dir(self.dir.path())
            .with_health_timing(10, 600)
    }

    fn request(&self, function: Function, record: Value) -> RunRequest {
        let patch_id = record["patch_id"].as_u64().unwrap();
        RunRequest {
            oracle_home: Some(self.home.clone()),
            swlib_path: Some(PathBuf::from(self.stage())),
            patch_id: Some(patch_id),
            patch_only_oh: Some(false),
            patch_ojvm: Some(false),
            patch_db_all: Some(true),
            patch_item: Some(record),
            oratab_file: Some(self.oratab.clone()),
            hostname: Some("node1".to_string()),
            ..RunRequest::new(function)
        }
    }

    fn engine(&self, runner: &ScriptedExecutor) -> (PatchEngine, Arc<MemoryLogger>) {
        self.engine_with(runner, self.preferences(), Arc::new(RecordingSleeper::default()))
    }

    fn engine_with(
        &self,
        runner: &ScriptedExecutor,
        prefs: EnginePreferences,
        sleeper: Arc<RecordingSleeper>,
    ) -> (PatchEngine, Arc<MemoryLogger>) {
        let memory = Arc::new(MemoryLogger::new());
        let engine = PatchEngine::new(Arc::new(runner.clone()))
            .with_preferences(prefs)
            .with_sleeper(sleeper)
            .with_log(LoggingService::new(memory.clone(), LogLevel::Debug));
        (engine, memory)
    }
}

const DB_ROW: &str = ";PROD;READ WRITE;PRIMARY;FALSE;1;OPEN;PRODDB";
const STANDBY_ROW: &str = ";PROD;MOUNTED;PHYSICAL STANDBY;FALSE;1;MOUNTED;PRODDB";
const HAS_ONLINE: &str = "CRS-4638: Oracle High Availability Services is online";

fn plain_record(patch_id: u64) -> Value {
    json!({ "patch_id": patch_id, "patch_dir": patch_id.to_string(), "desc": "DB RU" })
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_new_dialect_grid_patch_without_subpath() {
    let fixture = Fixture::new(19, true);
    let runner = ScriptedExecutor::new()
        .on("opatchauto apply", "OPatchAuto successful.")
        .on("crsctl check has", HAS_ONLINE);
    let (engine, memory) = fixture.engine(&runner);

    let record = json!({ "patch_id": 29708769, "patch_gi_id": 29708769, "patch_dir": "29708769" });
    let response = engine.run(&fixture.request(Function::PatchOh, record));

    assert!(!response.failed, "{}", response.msg);
    assert!(response.changed);

    let apply = runner.calls()[runner.position("opatchauto apply").unwrap()].clone();
    assert_eq!(
        apply.line,
        format!(
            "sudo {home}/OPatch/opatchauto apply {stage}/29708769 -oh {home}",
            home = fixture.home(),
            stage = fixture.stage()
        )
    );
    assert!(!apply.interactive);
    assert!(memory.contains("HAS is online, continue..."));
}

#[test]
fn test_old_dialect_combo_grid_patch_no_action() {
    let fixture = Fixture::new(11, true);
    let runner = ScriptedExecutor::new()
        .on("emocmrsp", "")
        .on("opatch auto", "Patch 30 : No need to apply this patch, already applied.")
        .on("crsctl check has", HAS_ONLINE);
    let (engine, _) = fixture.engine(&runner);

    let record = json!({
        "patch_id": 31326369,
        "patch_gi_id": 31305087,
        "patch_ojvm_id": 31219939,
        "patch_dir": "31326369"
    });
    let response = engine.run(&fixture.request(Function::PatchOh, record));

    assert!(!response.failed, "{}", response.msg);
    assert!(!response.changed);

    let ocm = runner.calls()[runner.position("emocmrsp").unwrap()].clone();
    assert!(ocm.interactive);
    assert!(!ocm.credential_offered);

    let apply = &runner.lines()[runner.position("opatch auto").unwrap()];
    assert!(apply.contains(&format!("{}/31326369/31305087 -oh", fixture.stage())));
    assert!(apply.contains(" -ocmrf "));
    assert!(apply.contains("orapatch_ocm_"));
}

#[test]
fn test_standby_in_list_is_not_patched() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = ScriptedExecutor::new()
        .on("ps -eo args", "ora_pmon_PROD")
        .on("sqlplus", STANDBY_ROW)
        .on("srvctl status database", "");
    let (engine, memory) = fixture.engine(&runner);

    let mut request = fixture.request(Function::PatchDb, plain_record(29517242));
    request.patch_db_all = Some(false);
    request.patch_db_list = Some("PRODDB".to_string());
    let response = engine.run(&request);

    assert!(!response.failed, "{}", response.msg);
    assert!(!response.changed);
    assert_eq!(runner.count("datapatch"), 0);
    assert_eq!(runner.count("shutdown"), 0);
    assert!(memory.contains("won't be patched because it's a standby"));
}

#[test]
fn test_grid_health_timeout_names_stack() {
    let fixture = Fixture::new(19, true);
    let runner = ScriptedExecutor::new()
        .on("opatchauto apply", "OPatchAuto successful.")
        .on(
            "crsctl check has",
            "CRS-4639: Could not contact Oracle High Availability Services",
        );
    let sleeper = Arc::new(RecordingSleeper::default());
    let prefs = fixture.preferences().with_health_timing(10, 30);
    let (engine, memory) = fixture.engine_with(&runner, prefs, sleeper.clone());

    let record = json!({ "patch_id": 29708769, "patch_gi_id": 29708769, "patch_dir": "29708769" });
    let response = engine.run(&fixture.request(Function::PatchOh, record));

    assert!(response.failed);
    assert_eq!(response.rc, 245);
    assert!(response.msg.contains("Error: HAS start timeout."));
    assert_eq!(runner.count("crsctl check has"), 4);
    assert_eq!(
        *sleeper.naps.lock().unwrap(),
        vec![Duration::from_secs(10); 3]
    );
    assert!(memory.contains("HAS is not online, check again in 10 seconds..."));
}

#[test]
fn test_cluster_member_polls_crs() {
    let fixture = Fixture::new(19, true).cluster_member();
    let runner = ScriptedExecutor::new()
        .on("cemutlo -n", "prodclu")
        .on("opatchauto apply", "OPatchAuto successful.")
        .on(
            "crsctl check crs",
            "CRS-4638: Oracle High Availability Services is online\nCRS-4537: Cluster Ready Services is online",
        );
    let (engine, memory) = fixture.engine(&runner);

    let record = json!({ "patch_id": 29708769, "patch_gi_id": 29708769, "patch_dir": "29708769" });
    let response = engine.run(&fixture.request(Function::PatchOh, record));

    assert!(!response.failed, "{}", response.msg);
    assert!(memory.contains("CRS is online, continue..."));
    assert_eq!(runner.count("crsctl check has"), 0);
}

#[test]
fn test_prerequisite_run_reports_unchanged() {
    let fixture = Fixture::new(19, false);
    let runner = ScriptedExecutor::new()
        .on(
            "CheckConflictAgainstOHWithDetail",
            "Prereq \"checkConflictAgainstOHWithDetail\" passed.\n\nOPatch succeeded.",
        )
        .on(
            "CheckSystemSpace",
            "Prereq \"checkSystemSpace\" passed.\n\nOPatch succeeded.",
        );
    let (engine, _) = fixture.engine(&runner);

    let mut request = fixture.request(Function::CheckConflictAgainstOh, plain_record(29517242));
    request.only_prereq = true;
    request.patch_only_oh = None;
    request.patch_ojvm = None;
    request.patch_db_all = None;
    let response = engine.run(&request);

    assert!(!response.failed, "{}", response.msg);
    assert!(!response.changed);
    assert_eq!(
        runner.lines()[runner.position("CheckConflictAgainstOHWithDetail").unwrap()],
        format!(
            "{}/OPatch/opatch prereq CheckConflictAgainstOHWithDetail -phBaseDir {}/29517242",
            fixture.home(),
            fixture.stage()
        )
    );
    assert_eq!(runner.count("ps -eo args"), 0);
}

#[test]
fn test_prerequisite_without_marker_fails() {
    let fixture = Fixture::new(19, false);
    let runner = ScriptedExecutor::new().on(
        "CheckConflictAgainstOHWithDetail",
        "Prereq \"checkConflictAgainstOHWithDetail\" failed.",
    );
    let (engine, _) = fixture.engine(&runner);

    let mut request = fixture.request(Function::CheckConflictAgainstOh, plain_record(29517242));
    request.only_prereq = true;
    let response = engine.run(&request);

    assert!(response.failed);
    assert!(response
        .msg
        .contains(&format!("CheckConflictAgainstOHWithDetail failed for {}", fixture.home())));
}

// ============================================================================
// ORDERING AND IDEMPOTENCE
// ============================================================================

fn running_db_home(fixture: &Fixture, apply_outputs: &[&str]) -> ScriptedExecutor {
    let running = format!(
        "ora_pmon_PROD\n{}/bin/tnslsnr LISTENER -inherit",
        fixture.home()
    );
    ScriptedExecutor::new()
        .on_sequence("ps -eo args", &[&running, &running, "/sbin/init"])
        .on("sqlplus", DB_ROW)
        .on("srvctl status database", "")
        .on_sequence("opatch apply", apply_outputs)
}

#[test]
fn test_stop_apply_start_order() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = running_db_home(&fixture, &["OPatch succeeded."]);
    let (engine, memory) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(Function::PatchOh, plain_record(29517242)));
    assert!(!response.failed, "{}", response.msg);
    assert!(response.changed);

    let calls = runner.calls();
    let stdin_at = |input: &str| {
        calls
            .iter()
            .position(|c| c.stdin.as_deref() == Some(input))
            .unwrap()
    };
    let listener_stop = runner.position("lsnrctl stop LISTENER").unwrap();
    let shutdown = stdin_at("shutdown immediate\n");
    let apply = runner.position("opatch apply -silent").unwrap();
    let startup = stdin_at("startup open\n");
    let listener_start = runner.position("lsnrctl start LISTENER").unwrap();

    assert!(listener_stop < shutdown);
    assert!(shutdown < apply);
    assert!(apply < startup);
    assert!(startup < listener_start);
    assert_eq!(
        calls[apply].line,
        format!(
            "{}/OPatch/opatch apply -silent {}/29517242",
            fixture.home(),
            fixture.stage()
        )
    );
    assert!(memory.contains("PATCH_OH => CHECK_RUNNING_SERVICES_FROM_OH"));
}

#[test]
fn test_second_run_is_no_action() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = running_db_home(
        &fixture,
        &["OPatch succeeded.", "Patch 29517242: No need to apply this patch."],
    );
    let (engine, _) = fixture.engine(&runner);
    let request = fixture.request(Function::PatchOh, plain_record(29517242));

    assert!(engine.run(&request).changed);

    let second = engine.run(&request);
    assert!(!second.failed, "{}", second.msg);
    assert!(!second.changed);
}

#[test]
fn test_no_need_to_apply_leaves_unchanged() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = running_db_home(&fixture, &["Patch 29517242: No need to apply this patch."]);
    let (engine, _) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(Function::PatchOh, plain_record(29517242)));
    assert!(!response.failed, "{}", response.msg);
    assert!(!response.changed);
    assert_eq!(runner.count("lsnrctl start LISTENER"), 1);
}

#[test]
fn test_process_left_running_fails_before_apply() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let running = format!("ora_pmon_PROD\n{}/bin/tnslsnr LISTENER", fixture.home());
    let runner = ScriptedExecutor::new()
        .on("ps -eo args", &running)
        .on("sqlplus", DB_ROW)
        .on("srvctl status database", "");
    let (engine, _) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(Function::PatchOh, plain_record(29517242)));
    assert!(response.failed);
    assert!(response.msg.contains("There are running processes under"));
    assert_eq!(runner.count("opatch apply"), 0);
    assert_eq!(runner.count("lsnrctl start"), 0);
}

// ============================================================================
// DICTIONARY AND GATES
// ============================================================================

#[test]
fn test_dictionary_patch_cycles_open_database() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = ScriptedExecutor::new()
        .on("ps -eo args", "ora_pmon_PROD")
        .on("sqlplus", DB_ROW)
        .on("srvctl status database", "")
        .on("datapatch", "SQL Patching tool complete");
    let (engine, memory) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(Function::PatchDb, plain_record(29517242)));
    assert!(!response.failed, "{}", response.msg);
    assert!(response.changed);

    let calls = runner.calls();
    let datapatch = runner.position("datapatch -verbose").unwrap();
    assert_eq!(calls[datapatch].env_value("ORACLE_SID"), Some("PROD"));
    assert_eq!(calls[datapatch - 1].stdin.as_deref(), Some("startup open\n"));
    assert_eq!(calls[datapatch + 1].stdin.as_deref(), Some("shutdown immediate\n"));
    assert_eq!(runner.count("lsnrctl"), 0);
    assert!(memory.contains("Database dictionary \"PROD\" was patched."));
}

#[test]
fn test_ojvm_dictionary_starts_in_upgrade_mode() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = ScriptedExecutor::new()
        .on("ps -eo args", "ora_pmon_PROD")
        .on("sqlplus", DB_ROW)
        .on("srvctl status database", "");
    let (engine, _) = fixture.engine(&runner);

    let record = json!({ "patch_id": 5, "patch_db_id": 6, "patch_ojvm_id": 7, "patch_dir": "5" });
    let response = engine.run(&fixture.request(Function::PatchDbOjvm, record));
    assert!(!response.failed, "{}", response.msg);

    let calls = runner.calls();
    let datapatch = runner.position("datapatch").unwrap();
    assert_eq!(calls[datapatch - 1].stdin.as_deref(), Some("startup upgrade\n"));
}

#[test]
fn test_ojvm_function_without_ojvm_component_is_skipped() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = ScriptedExecutor::new();
    let (engine, memory) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(Function::PatchOhOjvm, plain_record(29517242)));
    assert!(!response.failed, "{}", response.msg);
    assert!(!response.changed);
    assert!(memory.contains("Skip OJVM."));
    assert_eq!(runner.count("ps -eo args"), 0);
}

#[test]
fn test_dictionary_on_grid_home_is_gated() {
    let fixture = Fixture::new(19, true);
    let runner = ScriptedExecutor::new();
    let (engine, _) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(Function::PatchDb, plain_record(29517242)));
    assert!(!response.failed, "{}", response.msg);
    assert!(!response.changed);
    assert_eq!(runner.count("ps -eo args"), 0);
}

#[test]
fn test_cluster_upgrade_state_gate() {
    let fixture = Fixture::new(19, false).cluster_member().with_oratab("PROD");
    fs::write(
        fixture.dir.path().join("olr.loc"),
        "olrconfig_loc=/u01/grid/cdata/node1.olr\ncrs_home=/u01/grid\n",
    )
    .unwrap();
    let runner = ScriptedExecutor::new()
        .on("cemutlo -n", "prodclu")
        .on(
            "crsctl query crs activeversion",
            "Oracle Clusterware active version on the cluster is [19.0.0.0.0]. The cluster upgrade state is [ROLLING PATCH].",
        );
    let (engine, memory) = fixture.engine(&runner);

    let mut request = fixture.request(Function::PatchDb, plain_record(29517242));
    request.root_password = Some(Credential::new("s3cret"));
    let response = engine.run(&request);

    assert!(!response.failed, "{}", response.msg);
    assert!(!response.changed);

    let query = runner.calls()[runner.position("crsctl query crs").unwrap()].clone();
    assert_eq!(
        query.line,
        "su -c \"/u01/grid/bin/crsctl query crs activeversion -f\""
    );
    assert!(query.interactive);
    assert!(query.credential_offered);
    assert_eq!(runner.count("ps -eo args"), 0);
    assert!(memory.contains("Database dictionary won't be patched."));
    assert!(!memory.messages().iter().any(|m| m.contains("s3cret")));
}

#[test]
fn test_already_applied_skips_cycle() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = ScriptedExecutor::new().on(
        "lspatches -id 29517242",
        "Files check OK: Files from Patch ID 29517242 are present in Oracle Home.",
    );
    let (engine, memory) = fixture.engine(&runner);

    let mut request = fixture.request(Function::PatchOh, plain_record(29517242));
    request.verify_applied = true;
    let response = engine.run(&request);

    assert!(!response.failed, "{}", response.msg);
    assert!(!response.changed);
    assert_eq!(runner.count("ps -eo args"), 0);
    assert!(memory.contains("Patch 29517242 is already applied"));

    let outcome = engine.try_run(&request, &LoggingService::disabled()).unwrap();
    assert!(outcome.patch_applied);
    assert!(!outcome.changed);
}

#[test]
fn test_prerequisite_only_patch_oh_does_nothing() {
    let fixture = Fixture::new(19, false);
    let runner = ScriptedExecutor::new();
    let (engine, _) = fixture.engine(&runner);

    let mut request = fixture.request(Function::PatchOh, plain_record(29517242));
    request.only_prereq = true;
    let response = engine.run(&request);

    assert!(!response.failed, "{}", response.msg);
    assert!(!response.changed);
    assert!(runner.calls().is_empty());
}

#[test]
fn test_home_missing_from_inventory_fails() {
    let fixture = Fixture::new(19, false);
    let runner = ScriptedExecutor::new();
    let (engine, _) = fixture.engine(&runner);

    let mut request = fixture.request(Function::PatchOh, plain_record(29517242));
    let other = fixture.dir.path().join("other");
    fs::create_dir_all(&other).unwrap();
    request.oracle_home = Some(other);
    let response = engine.run(&request);

    assert!(response.failed);
    assert!(response.msg.contains("not found in inventory"));
}

// ============================================================================
// CRS REGISTRATION
// ============================================================================

fn registered_db_home(fixture: &Fixture, status: &str, config: &str) -> ScriptedExecutor {
    let running = format!(
        "ora_pmon_PROD\n{}/bin/tnslsnr LISTENER -inherit",
        fixture.home()
    );
    ScriptedExecutor::new()
        .on_sequence("ps -eo args", &[&running, &running, "/sbin/init"])
        .on("sqlplus", DB_ROW)
        .on("srvctl status database", status)
        .on("srvctl config database", config)
        .on("opatch apply", "OPatch succeeded.")
}

#[test]
fn test_two_status_lines_fail_registration() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = registered_db_home(&fixture, "Database is running.\nDatabase is running.", "");
    let (engine, _) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(Function::PatchOh, plain_record(29517242)));
    assert!(response.failed);
    assert_eq!(response.rc, 245);
    assert!(response
        .msg
        .contains("Failed in determining whether database PRODDB is registered in CRS"));
    assert_eq!(runner.count("srvctl config database"), 0);
    assert_eq!(runner.count("opatch apply"), 0);
}

#[test]
fn test_registered_database_cycles_through_srvctl() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = registered_db_home(
        &fixture,
        "Database is running.",
        "Database unique name: PRODDB\nType: SINGLE\nDatabase role: PRIMARY\nStart options: mount",
    );
    let (engine, memory) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(Function::PatchOh, plain_record(29517242)));
    assert!(!response.failed, "{}", response.msg);
    assert!(response.changed);

    let lines = runner.lines();
    let config = runner.position("srvctl config database").unwrap();
    assert_eq!(
        lines[config],
        format!("{}/bin/srvctl config database -db PRODDB -all", fixture.home())
    );

    let stop = runner.position("srvctl stop database").unwrap();
    let apply = runner.position("opatch apply -silent").unwrap();
    let start = runner.position("srvctl start database").unwrap();
    assert_eq!(
        lines[stop],
        format!("{}/bin/srvctl stop database -db PRODDB -stopoption immediate", fixture.home())
    );
    assert_eq!(
        lines[start],
        format!("{}/bin/srvctl start database -db PRODDB", fixture.home())
    );
    assert!(stop < apply);
    assert!(apply < start);
    assert!(!runner
        .calls()
        .iter()
        .any(|c| c.stdin.as_deref().is_some_and(|s| s.starts_with("startup"))));
    assert!(memory.contains("Database initial state: MOUNTED"));
    assert!(memory.contains("Database RAC: false"));
}

#[test]
fn test_registered_rac_standby_uses_instance_commands() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = registered_db_home(
        &fixture,
        "Database is running.",
        "Type: RAC\nDatabase role: PHYSICAL_STANDBY\nStart options: ",
    );
    let (engine, memory) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(Function::PatchOh, plain_record(29517242)));
    assert!(!response.failed, "{}", response.msg);

    let lines = runner.lines();
    let stop = runner.position("srvctl stop instance").unwrap();
    let start = runner.position("srvctl start instance").unwrap();
    assert_eq!(
        lines[stop],
        format!(
            "{}/bin/srvctl stop instance -db PRODDB -stopoption immediate -instance PROD",
            fixture.home()
        )
    );
    assert_eq!(
        lines[start],
        format!("{}/bin/srvctl start instance -db PRODDB -instance PROD", fixture.home())
    );
    assert!(memory.contains("Database RAC: true"));
    assert!(memory.contains("Database standby role: true"));
    assert!(memory.contains("Database initial state: OPEN"));
    assert!(memory.contains("Database [PRODDB] won't be patched because it's a standby."));
}

// ============================================================================
// OJVM BINARIES AND OLD-DIALECT DICTIONARY
// ============================================================================

fn ojvm_record() -> Value {
    json!({ "patch_id": 5, "patch_db_id": 6, "patch_ojvm_id": 7, "patch_dir": "5" })
}

#[test]
fn test_ojvm_binaries_apply_between_stop_and_start() {
    let fixture = Fixture::new(19, false).with_oratab("PROD");
    let runner = running_db_home(&fixture, &["OPatch succeeded."]);
    let (engine, _) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(Function::PatchOhOjvm, ojvm_record()));
    assert!(!response.failed, "{}", response.msg);
    assert!(response.changed);

    let calls = runner.calls();
    let apply = runner.position("opatch apply -silent").unwrap();
    let shutdown = calls
        .iter()
        .position(|c| c.stdin.as_deref() == Some("shutdown immediate\n"))
        .unwrap();
    let startup = calls
        .iter()
        .position(|c| c.stdin.as_deref() == Some("startup open\n"))
        .unwrap();

    assert_eq!(
        calls[apply].line,
        format!("{}/OPatch/opatch apply -silent {}/5/7", fixture.home(), fixture.stage())
    );
    assert!(shutdown < apply);
    assert!(apply < startup);
    assert_eq!(runner.count("opatch apply"), 1);
    assert_eq!(runner.count("emocmrsp"), 0);
}

#[test]
fn test_old_dialect_ojvm_binaries_pass_ocm_file() {
    let fixture = Fixture::new(11, false).with_oratab("PROD");
    let runner = running_db_home(&fixture, &["OPatch succeeded."]).on("emocmrsp", "");
    let (engine, _) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(Function::PatchOhOjvm, ojvm_record()));
    assert!(!response.failed, "{}", response.msg);
    assert!(response.changed);

    let ocm = runner.position("emocmrsp").unwrap();
    let apply = runner.position("opatch apply -silent").unwrap();
    assert!(ocm < apply);

    let line = &runner.lines()[apply];
    assert!(line.starts_with(&format!(
        "{}/OPatch/opatch apply -silent {}/5/7 -ocmrf ",
        fixture.home(),
        fixture.stage()
    )));
    assert!(line.contains("orapatch_ocm_"));
}

fn old_dialect_dictionary(function: Function, record: Value) -> (Fixture, ScriptedExecutor, bool) {
    let fixture = Fixture::new(11, false).with_oratab("PROD");
    let runner = ScriptedExecutor::new()
        .on("ps -eo args", "ora_pmon_PROD")
        .on("sqlplus", DB_ROW)
        .on("srvctl status database", "");
    let (engine, _) = fixture.engine(&runner);

    let response = engine.run(&fixture.request(function, record));
    assert!(!response.failed, "{}", response.msg);
    (fixture, runner, response.changed)
}

#[test]
fn test_old_dialect_dictionary_runs_catbundle() {
    let (fixture, runner, changed) =
        old_dialect_dictionary(Function::PatchDb, plain_record(29517242));
    assert!(changed);

    let calls = runner.calls();
    let script = format!("@{}/rdbms/admin/catbundle.sql psu apply\n", fixture.home());
    let at = calls
        .iter()
        .position(|c| c.stdin.as_deref() == Some(script.as_str()))
        .unwrap();
    assert_eq!(calls[at].line, format!("{}/bin/sqlplus / as sysdba", fixture.home()));
    assert_eq!(calls[at].env_value("ORACLE_SID"), Some("PROD"));
    assert_eq!(calls[at - 1].stdin.as_deref(), Some("startup open\n"));
    assert_eq!(calls[at + 1].stdin.as_deref(), Some("shutdown immediate\n"));
    assert_eq!(runner.count("datapatch"), 0);
}

#[test]
fn test_old_dialect_ojvm_dictionary_runs_postinstall() {
    let (fixture, runner, changed) = old_dialect_dictionary(Function::PatchDbOjvm, ojvm_record());
    assert!(changed);

    let calls = runner.calls();
    let script = format!("@{}/sqlpatch/7/postinstall.sql\n", fixture.home());
    let at = calls
        .iter()
        .position(|c| c.stdin.as_deref() == Some(script.as_str()))
        .unwrap();
    assert_eq!(calls[at - 1].stdin.as_deref(), Some("startup upgrade\n"));
    assert_eq!(calls[at + 1].stdin.as_deref(), Some("shutdown immediate\n"));
    assert!(!calls
        .iter()
        .any(|c| c.stdin.as_deref().is_some_and(|s| s.contains("catbundle"))));
}

// ============================================================================
// PRIVILEGED GRID APPLY
// ============================================================================

#[test]
fn test_grid_apply_with_credential_uses_su() {
    let fixture = Fixture::new(19, true);
    let runner = ScriptedExecutor::new()
        .on("opatchauto apply", "OPatchAuto successful.")
        .on("crsctl check has", HAS_ONLINE);
    let (engine, memory) = fixture.engine(&runner);

    let record = json!({ "patch_id": 29708769, "patch_gi_id": 29708769, "patch_dir": "29708769" });
    let mut request = fixture.request(Function::PatchOh, record);
    request.root_password = Some(Credential::new("s3cret"));
    let response = engine.run(&request);

    assert!(!response.failed, "{}", response.msg);
    assert!(response.changed);

    let apply = runner.calls()[runner.position("opatchauto apply").unwrap()].clone();
    assert_eq!(
        apply.line,
        format!(
            "su -c \"{home}/OPatch/opatchauto apply {stage}/29708769 -oh {home}\"",
            home = fixture.home(),
            stage = fixture.stage()
        )
    );
    assert!(apply.interactive);
    assert!(apply.credential_offered);
    assert_eq!(runner.count("sudo "), 0);
    assert!(!memory.messages().iter().any(|m| m.contains("s3cret")));
}
