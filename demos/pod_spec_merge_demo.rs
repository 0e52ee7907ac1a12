/// Example showing the pod spec merge table driving an object syncer.
///
/// A desired pod spec is merged into the stored Deployment: keyed lists are
/// matched by name, unmentioned fields survive and empty values never erase
/// populated ones.
///
/// Run with: cargo run --example pod_spec_merge_demo
use serde_json::{Value, json};
use std::sync::Arc;

use reconcile_kit::events::LogRecorder;
use reconcile_kit::merge::pod_spec::ENV_VARS;
use reconcile_kit::merge::{POD_SPEC, POD_SPEC_TAG, Transformer, pod_spec_transformers};
use reconcile_kit::observability::{LogFormat, init_logging};
use reconcile_kit::resources::Deployment;
use reconcile_kit::syncer::ObjectSyncer;
use reconcile_kit::{MemoryStore, ObjectStore, SyncContext, SyncError, sync};

fn deployment_syncer(store: Arc<dyn ObjectStore>, desired: Value) -> ObjectSyncer<Deployment> {
	ObjectSyncer::new(
		"WebDeployment",
		None,
		Deployment::new("default", "web"),
		store,
		move |deployment: &mut Deployment| {
			deployment.spec.replicas = Some(2);
			POD_SPEC
				.merge(&POD_SPEC_TAG, &mut deployment.spec.template.spec, &desired)
				.map_err(SyncError::from)
		},
	)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_logging(LogFormat::Pretty, log::Level::Info)?;
	println!("=== reconcile-kit Pod Spec Merge Demo ===\n");

	let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
	let recorder = LogRecorder::new("pod-spec-merge-demo");
	let ctx = SyncContext::new();

	println!("Example 1: Initial sync creates the Deployment");
	println!("-----------------------------------------------");
	let initial = json!({
		"priorityClassName": "high",
		"containers": [
			{"name": "app", "image": "nginx:1.26", "ports": [{"containerPort": 80}]},
			{"name": "metrics", "image": "statsd-exporter", "ports": [{"containerPort": 9102}, {"containerPort": 9125}]},
		],
	});
	let mut syncer = deployment_syncer(store.clone(), initial);
	let op = sync(&ctx, &mut syncer, Some(&recorder)).await?;
	println!("operation: {op}");
	println!("{}\n", serde_json::to_string_pretty(&syncer.object_ref().spec.template.spec)?);

	println!("Example 2: Dropping a container, empty values erase nothing");
	println!("-----------------------------------------------------------");
	let desired = json!({
		"priorityClassName": "",
		"containers": [{"name": "metrics", "image": "statsd-exporter:v2"}],
	});
	let mut syncer = deployment_syncer(store.clone(), desired);
	let op = sync(&ctx, &mut syncer, Some(&recorder)).await?;
	println!("operation: {op}");
	println!("{}\n", serde_json::to_string_pretty(&syncer.object_ref().spec.template.spec)?);

	println!("Example 3: Append-mode environment merge");
	println!("----------------------------------------");
	let append = pod_spec_transformers().with(ENV_VARS, Transformer::append_list_by_key("name"));
	let mut env = json!([{"name": "TEST", "value": "me"}]);
	append.merge(&ENV_VARS, &mut env, &json!([{"name": "TEST-2", "value": "me-2"}]))?;
	println!("append:  {env}");
	let mut env = json!([{"name": "TEST", "value": "me"}]);
	POD_SPEC.merge(&ENV_VARS, &mut env, &json!([{"name": "TEST-2", "value": "me-2"}]))?;
	println!("replace: {env}\n");

	println!("=== Demo Complete ===");
	Ok(())
}
