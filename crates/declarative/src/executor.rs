//! Convergence executor - walks a graph and drives providers
//!
//! With one job, resources are converged strictly in topological order.
//! With more, every resource whose prerequisites are all terminal forms a
//! batch that runs on a rayon pool; the next batch starts when the whole
//! batch is done. Either way a resource never starts before all of its
//! prerequisites finished, and a notified resource is refreshed at most once.

use crate::context::{ApplyContext, Backends, CancelToken, ProgressCallback};
use crate::diff::ResourceDiff;
use crate::error::{Error, ProviderError, ProviderResult, Result};
use crate::graph::Graph;
use crate::provider::{Provider, ProviderRegistry};
use crate::report::{ConvergenceReport, ResourceReport, ResourceStatus};
use crate::resource::Resource;
use crate::types::{ExecuteOptions, RefreshOutcome};
use rayon::prelude::*;
use std::time::Instant;

/// Read-only state shared by every resource of a run
struct Run<'a> {
    graph: &'a Graph,
    registry: &'a ProviderRegistry,
    ctx: ApplyContext<'a>,
    progress: &'a dyn ProgressCallback,
    cancel: &'a CancelToken,
}

/// Apply a graph to the host
///
/// Provider failures never abort the run: they are recorded in the report
/// and propagate to dependents as [`ResourceStatus::DependencyFailed`].
/// The only error returned here is failing to create the worker pool.
pub fn apply(
    graph: &Graph,
    registry: &ProviderRegistry,
    backends: &Backends,
    opts: &ExecuteOptions,
    progress: &dyn ProgressCallback,
    cancel: &CancelToken,
) -> Result<ConvergenceReport> {
    let run = Run {
        graph,
        registry,
        ctx: ApplyContext::new(backends, opts.noop),
        progress,
        cancel,
    };

    progress.on_run_start(graph.len());
    log::info!(
        "applying {} resources{}",
        graph.len(),
        if opts.noop { " (noop)" } else { "" }
    );

    let mut outcomes = if opts.jobs <= 1 || graph.len() <= 1 {
        run.sequential()
    } else {
        run.batched(opts.jobs)?
    };

    let resources = graph
        .order()
        .iter()
        .filter_map(|&index| outcomes[index].take())
        .collect();

    let report = ConvergenceReport::new(resources, opts.noop, cancel.is_cancelled());
    log::info!(
        "run finished: {} changed, {} unchanged, {} failed, {} dependency failed, {} skipped",
        report.summary.changed + report.summary.would_change,
        report.summary.unchanged,
        report.summary.failed,
        report.summary.dependency_failed,
        report.summary.skipped
    );
    Ok(report)
}

impl Run<'_> {
    fn sequential(&self) -> Vec<Option<ResourceReport>> {
        let mut outcomes: Vec<Option<ResourceReport>> =
            (0..self.graph.len()).map(|_| None).collect();
        for &index in self.graph.order() {
            let outcome = self.process(index, &outcomes);
            outcomes[index] = Some(outcome);
        }
        outcomes
    }

    fn batched(&self, jobs: usize) -> Result<Vec<Option<ResourceReport>>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;

        let graph = self.graph;
        let mut position = vec![0; graph.len()];
        for (pos, &index) in graph.order().iter().enumerate() {
            position[index] = pos;
        }

        let mut waiting: Vec<usize> = (0..graph.len())
            .map(|i| graph.prerequisites(i).len())
            .collect();
        let mut ready: Vec<usize> = (0..graph.len()).filter(|&i| waiting[i] == 0).collect();
        ready.sort_by_key(|&i| position[i]);

        let mut outcomes: Vec<Option<ResourceReport>> = (0..graph.len()).map(|_| None).collect();
        while !ready.is_empty() {
            log::debug!("starting batch of {} resources", ready.len());
            let done: Vec<(usize, ResourceReport)> = pool.install(|| {
                ready
                    .par_iter()
                    .map(|&index| (index, self.process(index, &outcomes)))
                    .collect()
            });

            let mut next = Vec::new();
            for (index, outcome) in done {
                outcomes[index] = Some(outcome);
                for &dependent in graph.dependents(index) {
                    waiting[dependent] -= 1;
                    if waiting[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            next.sort_by_key(|&i| position[i]);
            ready = next;
        }

        Ok(outcomes)
    }

    /// Converge and, if notified, refresh one resource
    ///
    /// Every prerequisite of `index` has an entry in `outcomes`.
    fn process(&self, index: usize, outcomes: &[Option<ResourceReport>]) -> ResourceReport {
        let resource = self.graph.resource(index);
        let status_of = |i: usize| outcomes[i].as_ref().map(|r| r.status);
        let started = Instant::now();

        if self.cancel.is_cancelled() {
            return self.finish(
                resource,
                started,
                ResourceStatus::Skipped,
                Some("run cancelled".into()),
            );
        }

        if let Some(&failed) = self
            .graph
            .prerequisites(index)
            .iter()
            .find(|&&p| status_of(p).is_some_and(|s| s.blocks_dependents()))
        {
            let message = format!("dependency {} did not converge", self.graph.resource(failed));
            log::warn!("skipping {resource}: {message}");
            return self.finish(resource, started, ResourceStatus::DependencyFailed, Some(message));
        }

        self.progress.on_resource_start(&resource.to_string());

        let Some(provider) = self.registry.get(resource.kind) else {
            let err = ProviderError::NoProvider(resource.kind.to_string());
            return self.finish(resource, started, ResourceStatus::Failed, Some(err.to_string()));
        };

        let (mut status, diff, mut message) = match self.converge(provider, resource) {
            Ok((status, diff)) => (status, diff, None),
            Err(err) => {
                log::warn!("{resource} failed: {err}");
                (ResourceStatus::Failed, ResourceDiff::default(), Some(err.to_string()))
            }
        };

        let notified = self
            .graph
            .notifiers(index)
            .iter()
            .any(|&n| status_of(n).is_some_and(|s| s.triggers_refresh()));

        let mut refresh = None;
        if notified && status != ResourceStatus::Failed && provider.refreshable() {
            if self.ctx.noop {
                log::info!("would refresh {resource}");
                refresh = Some(RefreshOutcome::WouldRefresh);
            } else {
                let own = (status == ResourceStatus::Changed).then_some(&diff);
                match provider.refresh(resource, own, &self.ctx) {
                    Ok(outcome) => refresh = Some(outcome),
                    Err(err) => {
                        log::warn!("refreshing {resource} failed: {err}");
                        status = ResourceStatus::Failed;
                        message = Some(format!("refresh failed: {err}"));
                    }
                }
            }
        }

        let report = ResourceReport {
            id: resource.to_string(),
            kind: resource.kind,
            title: resource.title.clone(),
            status,
            changes: diff.changes,
            refresh,
            message,
            duration_ms: elapsed_ms(started),
        };
        self.progress.on_resource_complete(&report);
        report
    }

    fn converge(
        &self,
        provider: &dyn Provider,
        resource: &Resource,
    ) -> ProviderResult<(ResourceStatus, ResourceDiff)> {
        let current = provider.current_state(resource, &self.ctx)?;
        let desired = provider.desired_state(resource, &self.ctx)?;
        let diff = ResourceDiff::compute(&current, &desired);

        if diff.is_empty() {
            log::debug!("{resource} is in sync");
            return Ok((ResourceStatus::Unchanged, diff));
        }
        if self.ctx.noop {
            log::info!("{resource} would change ({} attributes)", diff.changes.len());
            return Ok((ResourceStatus::WouldChange, diff));
        }

        let result = provider.converge(resource, &diff, &self.ctx)?;
        if result.is_change() {
            log::info!("{resource} {result:?}");
            Ok((ResourceStatus::Changed, diff))
        } else {
            Ok((ResourceStatus::Unchanged, ResourceDiff::default()))
        }
    }

    fn finish(
        &self,
        resource: &Resource,
        started: Instant,
        status: ResourceStatus,
        message: Option<String>,
    ) -> ResourceReport {
        let report = ResourceReport {
            id: resource.to_string(),
            kind: resource.kind,
            title: resource.title.clone(),
            status,
            changes: Vec::new(),
            refresh: None,
            message,
            duration_ms: elapsed_ms(started),
        };
        self.progress.on_resource_complete(&report);
        report
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::context::NoProgress;
    use crate::graph::build_graph;
    use crate::memory::MemoryHost;
    use crate::types::{ResourceKind, ResourceRef};
    use std::sync::Arc;

    fn r(s: &str) -> ResourceRef {
        s.parse().unwrap()
    }

    /// package -> config file ~> service, plus an unrelated package
    fn web_catalog(config: &str) -> Catalog {
        let mut catalog = Catalog::new("web");
        catalog
            .add(Resource::new(ResourceKind::Package, "nginx"))
            .unwrap();
        catalog
            .add(
                Resource::new(ResourceKind::File, "/etc/nginx/nginx.conf")
                    .with_property("content", config)
                    .requires(r("Package[nginx]"))
                    .notifies(r("Service[nginx]")),
            )
            .unwrap();
        catalog
            .add(Resource::new(ResourceKind::Service, "nginx").requires(r("Package[nginx]")))
            .unwrap();
        catalog
            .add(Resource::new(ResourceKind::Package, "curl"))
            .unwrap();
        catalog
    }

    fn run(host: &Arc<MemoryHost>, catalog: &Catalog, opts: ExecuteOptions) -> ConvergenceReport {
        let graph = build_graph(catalog).unwrap();
        let backends = Backends::from_host(host.clone());
        apply(
            &graph,
            &ProviderRegistry::standard(),
            &backends,
            &opts,
            &NoProgress,
            &CancelToken::new(),
        )
        .unwrap()
    }

    fn status(report: &ConvergenceReport, id: &str) -> ResourceStatus {
        report.get(id).unwrap().status
    }

    #[test]
    fn test_fresh_host_converges_then_idempotent() {
        let host = Arc::new(MemoryHost::new());
        let catalog = web_catalog("events {}\n");

        let first = run(&host, &catalog, ExecuteOptions::default());
        assert!(first.success());
        assert_eq!(first.summary.changed, 4);
        let service = first.get("Service[nginx]").unwrap();
        assert!(matches!(service.refresh, Some(RefreshOutcome::Skipped { .. })));
        assert_eq!(host.journal_count("restart nginx"), 0);

        let journal = host.journal();
        let pos = |entry: &str| journal.iter().position(|e| e == entry).unwrap();
        assert!(pos("install nginx") < pos("write /etc/nginx/nginx.conf"));
        assert!(pos("write /etc/nginx/nginx.conf") < pos("start nginx"));

        let second = run(&host, &catalog, ExecuteOptions::default());
        assert_eq!(second.summary.unchanged, 4);
        assert!(!second.has_changes());
        assert!(second.resources.iter().all(|r| r.refresh.is_none()));
    }

    #[test]
    fn test_config_change_restarts_running_service_once() {
        let host = Arc::new(
            MemoryHost::new()
                .with_package("nginx", "1.24.0")
                .with_service("nginx", true, true)
                .with_file("/etc/nginx/nginx.conf", "old\n"),
        );
        let mut catalog = web_catalog("new\n");
        catalog
            .add(
                Resource::new(ResourceKind::File, "/etc/nginx/mime.types")
                    .with_property("content", "types {}\n")
                    .notifies(r("Service[nginx]")),
            )
            .unwrap();

        let report = run(&host, &catalog, ExecuteOptions::default());
        assert_eq!(status(&report, "Service[nginx]"), ResourceStatus::Unchanged);
        assert_eq!(
            report.get("Service[nginx]").unwrap().refresh,
            Some(RefreshOutcome::Restarted)
        );
        assert_eq!(host.journal_count("restart nginx"), 1);
        assert_eq!(report.summary.refreshed, 1);
    }

    #[test]
    fn test_noop_mutates_nothing() {
        let host = Arc::new(MemoryHost::new().with_service("nginx", true, true));
        let catalog = web_catalog("events {}\n");

        let report = run(
            &host,
            &catalog,
            ExecuteOptions {
                noop: true,
                jobs: 1,
            },
        );
        assert!(report.noop);
        assert_eq!(status(&report, "Package[nginx]"), ResourceStatus::WouldChange);
        assert_eq!(
            report.get("Service[nginx]").unwrap().refresh,
            Some(RefreshOutcome::WouldRefresh)
        );
        assert!(host.journal().is_empty());
        assert!(host.package_version("nginx").is_none());
    }

    #[test]
    fn test_failure_propagates_to_dependents_only() {
        let host = Arc::new(MemoryHost::new().fail_on("install nginx"));
        let report = run(&host, &web_catalog("x"), ExecuteOptions::default());

        assert_eq!(status(&report, "Package[nginx]"), ResourceStatus::Failed);
        assert_eq!(
            status(&report, "File[/etc/nginx/nginx.conf]"),
            ResourceStatus::DependencyFailed
        );
        assert_eq!(status(&report, "Service[nginx]"), ResourceStatus::DependencyFailed);
        assert_eq!(status(&report, "Package[curl]"), ResourceStatus::Changed);
        assert_eq!(report.exit_code(), 1);
        assert!(host.file_stat("/etc/nginx/nginx.conf").is_none());
    }

    #[test]
    fn test_transitive_dependency_failure() {
        let host = Arc::new(
            MemoryHost::new()
                .with_command("false", false)
                .with_command("test -f /run/done", false),
        );
        let mut catalog = Catalog::new("chain");
        catalog
            .add(
                Resource::new(ResourceKind::Exec, "false")
                    .with_property("unless", "test -f /run/done"),
            )
            .unwrap();
        catalog
            .add(Resource::new(ResourceKind::Package, "a").requires(r("Exec[false]")))
            .unwrap();
        catalog
            .add(Resource::new(ResourceKind::Package, "b").requires(r("Package[a]")))
            .unwrap();

        let report = run(&host, &catalog, ExecuteOptions::default());
        assert_eq!(status(&report, "Exec[false]"), ResourceStatus::Failed);
        assert_eq!(status(&report, "Package[a]"), ResourceStatus::DependencyFailed);
        assert_eq!(status(&report, "Package[b]"), ResourceStatus::DependencyFailed);
    }

    #[test]
    fn test_exec_runs_once_then_idempotent() {
        let guard = "test -f /etc/nginx/dhparam.pem";
        let host = Arc::new(MemoryHost::new().with_command(guard, false));
        let mut catalog = Catalog::new("tls");
        catalog
            .add(
                Resource::new(ResourceKind::Exec, "dhparam")
                    .with_property("command", "openssl dhparam -out /etc/nginx/dhparam.pem 2048")
                    .with_property("unless", guard),
            )
            .unwrap();

        let first = run(&host, &catalog, ExecuteOptions::default());
        assert_eq!(status(&first, "Exec[dhparam]"), ResourceStatus::Changed);

        let host = Arc::new(MemoryHost::new().with_command(guard, true));
        let second = run(&host, &catalog, ExecuteOptions::default());
        assert_eq!(second.summary.changed, 0);
        assert_eq!(host.journal_count("run openssl dhparam -out /etc/nginx/dhparam.pem 2048"), 0);
    }

    #[test]
    fn test_unguarded_exec_fails_without_running() {
        let host = Arc::new(MemoryHost::new());
        let mut catalog = Catalog::new("validate");
        catalog
            .add(Resource::new(ResourceKind::Exec, "validate").with_property("command", "nginx -t"))
            .unwrap();

        for _ in 0..2 {
            let report = run(&host, &catalog, ExecuteOptions::default());
            assert_eq!(status(&report, "Exec[validate]"), ResourceStatus::Failed);
            assert_eq!(report.summary.changed, 0);
        }
        assert_eq!(host.journal_count("run nginx -t"), 0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential_host = Arc::new(MemoryHost::new());
        let parallel_host = Arc::new(MemoryHost::new());
        let catalog = web_catalog("events {}\n");

        let sequential = run(&sequential_host, &catalog, ExecuteOptions::default());
        let parallel = run(
            &parallel_host,
            &catalog,
            ExecuteOptions {
                noop: false,
                jobs: 4,
            },
        );

        let ids = |r: &ConvergenceReport| -> Vec<(String, ResourceStatus)> {
            r.resources.iter().map(|x| (x.id.clone(), x.status)).collect()
        };
        assert_eq!(ids(&sequential), ids(&parallel));

        let journal = parallel_host.journal();
        let pos = |entry: &str| journal.iter().position(|e| e == entry).unwrap();
        assert!(pos("install nginx") < pos("write /etc/nginx/nginx.conf"));
        assert!(pos("install nginx") < pos("start nginx"));
    }

    #[test]
    fn test_cancel_before_start_skips_everything() {
        let host = Arc::new(MemoryHost::new());
        let graph = build_graph(&web_catalog("x")).unwrap();
        let backends = Backends::from_host(host.clone());
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = apply(
            &graph,
            &ProviderRegistry::standard(),
            &backends,
            &ExecuteOptions::default(),
            &NoProgress,
            &cancel,
        )
        .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.summary.skipped, 4);
        assert!(host.journal().is_empty());
    }

    struct CancelAfterFirst(CancelToken);

    impl ProgressCallback for CancelAfterFirst {
        fn on_run_start(&self, _total: usize) {}
        fn on_resource_start(&self, _id: &str) {}
        fn on_resource_complete(&self, _report: &ResourceReport) {
            self.0.cancel();
        }
    }

    #[test]
    fn test_cancel_mid_run_finishes_current_resource() {
        let host = Arc::new(MemoryHost::new());
        let graph = build_graph(&web_catalog("x")).unwrap();
        let backends = Backends::from_host(host.clone());
        let cancel = CancelToken::new();

        let report = apply(
            &graph,
            &ProviderRegistry::standard(),
            &backends,
            &ExecuteOptions::default(),
            &CancelAfterFirst(cancel.clone()),
            &cancel,
        )
        .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.summary.changed, 1);
        assert_eq!(report.summary.skipped, 3);
        assert!(!report.success());
    }

    #[test]
    fn test_missing_provider_fails_resource() {
        let host = Arc::new(MemoryHost::new());
        let graph = build_graph(&web_catalog("x")).unwrap();
        let backends = Backends::from_host(host);
        let report = apply(
            &graph,
            &ProviderRegistry::empty(),
            &backends,
            &ExecuteOptions::default(),
            &NoProgress,
            &CancelToken::new(),
        )
        .unwrap();
        let package = report.get("Package[nginx]").unwrap();
        assert_eq!(package.status, ResourceStatus::Failed);
        assert!(package.message.as_deref().unwrap().contains("no provider"));
    }

    #[test]
    fn test_refresh_failure_marks_resource_failed() {
        let host = Arc::new(
            MemoryHost::new()
                .with_package("nginx", "1.24.0")
                .with_service("nginx", true, true)
                .fail_on("restart nginx"),
        );
        let report = run(&host, &web_catalog("changed\n"), ExecuteOptions::default());
        let service = report.get("Service[nginx]").unwrap();
        assert_eq!(service.status, ResourceStatus::Failed);
        assert!(service.message.as_deref().unwrap().starts_with("refresh failed"));
    }
}
