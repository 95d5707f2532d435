//! End-to-end runs of the nginx demo: compile, build the graph, apply to an
//! in-memory host.

use crate::facts::{OS_FAMILY, PROCESSOR_COUNT, SELINUX_ENFORCING};
use crate::{HostFacts, Manifest, ParamInputs, compile};
use declarative::memory::MemoryHost;
use declarative::{
    Backends, CancelToken, Catalog, ConvergenceReport, Ensure, ExecuteOptions, NoProgress,
    ProviderRegistry, RefreshOutcome, ResourceKind, ResourceStatus, apply, build_graph,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

const SENTINEL: &str = "# This file is managed by converge.\n# The vendor default server is disabled.\n";

fn demo() -> Manifest {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/nginx/manifest.toml");
    Manifest::load(&path).unwrap()
}

fn facts(selinux: bool) -> HostFacts {
    HostFacts::new()
        .with(OS_FAMILY, "RedHat")
        .with(PROCESSOR_COUNT, 2)
        .with(SELINUX_ENFORCING, selinux)
}

fn host() -> MemoryHost {
    MemoryHost::new()
        .with_user("root", 0)
        .with_group("root", 0)
        .with_boolean("httpd_can_network_connect", false)
        .with_boolean("httpd_setrlimit", false)
}

fn catalog(inputs: &ParamInputs, selinux: bool) -> Catalog {
    compile(&demo(), inputs, &facts(selinux)).unwrap()
}

fn converge(catalog: &Catalog, host: &Arc<MemoryHost>, jobs: usize) -> ConvergenceReport {
    let graph = build_graph(catalog).unwrap();
    apply(
        &graph,
        &ProviderRegistry::standard(),
        &Backends::from_host(host.clone()),
        &ExecuteOptions { noop: false, jobs },
        &NoProgress,
        &CancelToken::new(),
    )
    .unwrap()
}

fn titles(catalog: &Catalog, kind: ResourceKind) -> Vec<(String, Ensure)> {
    catalog
        .of_kind(kind)
        .map(|r| (r.title.clone(), r.ensure.clone()))
        .collect()
}

#[test]
fn test_compile_is_deterministic() {
    let inputs = ParamInputs::new()
        .with("modular", true)
        .with("modules", json!(["stream", "geoip"]))
        .with("mime_types", json!({"text/html": "html htm", "text/css": "css"}));
    let first = serde_json::to_string(&catalog(&inputs, true)).unwrap();
    let second = serde_json::to_string(&catalog(&inputs, true)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_defaults_render_main_config() {
    let catalog = catalog(&ParamInputs::new(), false);
    let conf = catalog
        .get(&"File[/etc/nginx/nginx.conf]".parse().unwrap())
        .unwrap();
    let content = conf.property("content").unwrap();
    assert!(content.contains("user nginx;"));
    assert!(content.contains("worker_processes 2;"));
    assert!(content.contains("pid /var/run/nginx.pid;"));
    assert!(!content.contains("worker_rlimit_nofile"));
    assert!(!content.contains("modules-enabled"));

    let debian = compile(
        &demo(),
        &ParamInputs::new(),
        &facts(false).with(OS_FAMILY, "Debian"),
    )
    .unwrap();
    let content = debian.resources()[1].property("content").unwrap().to_string();
    assert!(content.contains("user www-data;"));
    assert!(content.contains("pid /run/nginx.pid;"));
}

#[test]
fn test_empty_mime_types_omits_file() {
    let catalog = catalog(&ParamInputs::new(), false);
    assert!(
        catalog
            .get(&"File[/etc/nginx/mime.types]".parse().unwrap())
            .is_none()
    );

    let inputs = ParamInputs::new().with("mime_types", json!({"text/html": "html htm"}));
    let catalog = self::catalog(&inputs, false);
    let mime = catalog
        .get(&"File[/etc/nginx/mime.types]".parse().unwrap())
        .unwrap();
    assert!(mime.property("content").unwrap().contains("    text/html html htm;\n"));
}

#[test]
fn test_modular_expands_modules() {
    let inputs = ParamInputs::new()
        .with("modular", true)
        .with("modules", json!(["a", "b"]))
        .with("modules_absent", json!(["c"]));
    let catalog = catalog(&inputs, false);
    assert_eq!(
        titles(&catalog, ResourceKind::Module),
        vec![
            ("a".to_string(), Ensure::Present),
            ("b".to_string(), Ensure::Present),
            ("c".to_string(), Ensure::Absent),
        ]
    );
    let a = catalog.get(&"Module[a]".parse().unwrap()).unwrap();
    assert_eq!(a.property("path"), Some("/etc/nginx/modules-enabled/a.conf"));
    assert_eq!(
        a.property("target"),
        Some("/usr/share/nginx/modules-available/a.conf")
    );

    let not_modular = ParamInputs::new().with("modules", json!(["a"]));
    assert!(titles(&self::catalog(&not_modular, false), ResourceKind::Module).is_empty());
}

#[test]
fn test_selinux_booleans() {
    assert!(titles(&catalog(&ParamInputs::new(), false), ResourceKind::Boolean).is_empty());

    let booleans = titles(&catalog(&ParamInputs::new(), true), ResourceKind::Boolean);
    assert_eq!(booleans.len(), 1);
    assert_eq!(booleans[0].0, "httpd_can_network_connect");

    let inputs = ParamInputs::new().with("worker_rlimit_nofile", 65535);
    let catalog = catalog(&inputs, true);
    let names: Vec<String> = titles(&catalog, ResourceKind::Boolean)
        .into_iter()
        .map(|(t, _)| t)
        .collect();
    assert_eq!(names, vec!["httpd_can_network_connect", "httpd_setrlimit"]);
}

#[test]
fn test_remove_default_conf_overwrites_with_sentinel() {
    let host = Arc::new(
        host()
            .with_package("nginx", "1.24.0")
            .with_service("nginx", true, true)
            .with_file("/etc/nginx/conf.d/default.conf", "server { listen 80; }\n"),
    );
    let inputs = ParamInputs::new().with("remove_default_conf", true);
    let catalog = catalog(&inputs, false);

    let first = converge(&catalog, &host, 1);
    assert!(first.success());
    let default_conf = first.get("File[/etc/nginx/conf.d/default.conf]").unwrap();
    assert_eq!(default_conf.status, ResourceStatus::Changed);
    assert_eq!(
        host.file_content("/etc/nginx/conf.d/default.conf").as_deref(),
        Some(SENTINEL)
    );

    let second = converge(&catalog, &host, 1);
    assert_eq!(
        second.get("File[/etc/nginx/conf.d/default.conf]").unwrap().status,
        ResourceStatus::Unchanged
    );
    assert!(!second.has_changes());
}

#[test]
fn test_fresh_host_is_idempotent() {
    let host = Arc::new(host());
    let catalog = catalog(&ParamInputs::new(), true);

    let first = converge(&catalog, &host, 1);
    assert!(first.success());
    assert_eq!(first.summary.failed, 0);
    assert_eq!(host.boolean("httpd_can_network_connect"), Some(true));
    assert!(host.service_status("nginx").running);
    assert!(host.service_status("nginx").enabled);

    let second = converge(&catalog, &host, 1);
    assert_eq!(second.summary.changed, 0);
    assert_eq!(second.summary.unchanged, second.summary.total);
}

#[test]
fn test_config_changes_restart_once() {
    let host = Arc::new(host());
    converge(&catalog(&ParamInputs::new(), false), &host, 1);
    host.clear_journal();

    let inputs = ParamInputs::new()
        .with("worker_connections", 2048)
        .with("mime_types", json!({"text/html": "html"}))
        .with("remove_default_conf", true);
    let report = converge(&catalog(&inputs, false), &host, 4);

    assert_eq!(report.summary.changed, 3);
    let service = report.get("Service[nginx]").unwrap();
    assert_eq!(service.status, ResourceStatus::Unchanged);
    assert_eq!(service.refresh, Some(RefreshOutcome::Restarted));
    assert_eq!(host.journal_count("restart nginx"), 1);
}

#[test]
fn test_package_failure_spares_independent_resources() {
    let host = Arc::new(host().fail_on("install nginx"));
    let report = converge(&catalog(&ParamInputs::new(), true), &host, 1);

    assert_eq!(
        report.get("Package[nginx]").unwrap().status,
        ResourceStatus::Failed
    );
    assert_eq!(
        report.get("File[/etc/nginx/nginx.conf]").unwrap().status,
        ResourceStatus::DependencyFailed
    );
    assert_eq!(
        report.get("Service[nginx]").unwrap().status,
        ResourceStatus::DependencyFailed
    );
    assert_eq!(
        report.get("Boolean[httpd_can_network_connect]").unwrap().status,
        ResourceStatus::Changed
    );
    assert_eq!(report.exit_code(), 1);
    assert_eq!(host.journal_count("start nginx"), 0);
}
