//! Merge schema and strategies for pod specifications.
//!
//! Field names follow the JSON representation of the orchestrator's core
//! `v1` API group, so pod specs can be merged straight from their wire form.

use once_cell::sync::Lazy;

use super::schema::{
	BOOL, INT32, OPT_BOOL, OPT_INT32, OPT_INT64, OPT_STRING, STRING, STRING_LIST, STRING_MAP,
	Schema, TypeTag,
};
use super::transformers::{Transformer, Transformers};

pub const POD_SPEC_TAG: TypeTag = TypeTag::from_static("core/v1.PodSpec");
pub const CONTAINER: TypeTag = TypeTag::from_static("core/v1.Container");
pub const CONTAINERS: TypeTag = TypeTag::from_static("[]core/v1.Container");
pub const CONTAINER_PORT: TypeTag = TypeTag::from_static("core/v1.ContainerPort");
pub const CONTAINER_PORTS: TypeTag = TypeTag::from_static("[]core/v1.ContainerPort");
pub const ENV_VAR: TypeTag = TypeTag::from_static("core/v1.EnvVar");
pub const ENV_VARS: TypeTag = TypeTag::from_static("[]core/v1.EnvVar");
pub const TOLERATION: TypeTag = TypeTag::from_static("core/v1.Toleration");
pub const TOLERATIONS: TypeTag = TypeTag::from_static("[]core/v1.Toleration");
pub const VOLUME: TypeTag = TypeTag::from_static("core/v1.Volume");
pub const VOLUMES: TypeTag = TypeTag::from_static("[]core/v1.Volume");
pub const LOCAL_OBJECT_REFERENCE: TypeTag = TypeTag::from_static("core/v1.LocalObjectReference");
pub const LOCAL_OBJECT_REFERENCES: TypeTag =
	TypeTag::from_static("[]core/v1.LocalObjectReference");
pub const HOST_ALIAS: TypeTag = TypeTag::from_static("core/v1.HostAlias");
pub const HOST_ALIASES: TypeTag = TypeTag::from_static("[]core/v1.HostAlias");
pub const VOLUME_MOUNT: TypeTag = TypeTag::from_static("core/v1.VolumeMount");
pub const VOLUME_MOUNTS: TypeTag = TypeTag::from_static("[]core/v1.VolumeMount");
pub const AFFINITY: TypeTag = TypeTag::from_static("core/v1.Affinity");
pub const OPT_AFFINITY: TypeTag = TypeTag::from_static("*core/v1.Affinity");
pub const RESOURCE_REQUIREMENTS: TypeTag = TypeTag::from_static("core/v1.ResourceRequirements");
pub const RESOURCE_LIST: TypeTag = TypeTag::from_static("core/v1.ResourceList");
pub const QUANTITY: TypeTag = TypeTag::from_static("resource.Quantity");
pub const OPT_QUANTITY: TypeTag = TypeTag::from_static("*resource.Quantity");

/// Sub-records merged field by field without a declared field list, each
/// paired with its optional form.
const SUB_RECORDS: &[(&str, &str)] = &[
	("core/v1.EnvVarSource", "*core/v1.EnvVarSource"),
	("core/v1.Probe", "*core/v1.Probe"),
	("core/v1.Lifecycle", "*core/v1.Lifecycle"),
	("core/v1.SecurityContext", "*core/v1.SecurityContext"),
	("core/v1.PodSecurityContext", "*core/v1.PodSecurityContext"),
	("core/v1.PodDNSConfig", "*core/v1.PodDNSConfig"),
	("core/v1.NodeAffinity", "*core/v1.NodeAffinity"),
	("core/v1.PodAffinity", "*core/v1.PodAffinity"),
	("core/v1.PodAntiAffinity", "*core/v1.PodAntiAffinity"),
	("core/v1.HostPathVolumeSource", "*core/v1.HostPathVolumeSource"),
	("core/v1.EmptyDirVolumeSource", "*core/v1.EmptyDirVolumeSource"),
	("core/v1.SecretVolumeSource", "*core/v1.SecretVolumeSource"),
	("core/v1.ConfigMapVolumeSource", "*core/v1.ConfigMapVolumeSource"),
	(
		"core/v1.PersistentVolumeClaimVolumeSource",
		"*core/v1.PersistentVolumeClaimVolumeSource",
	),
	("core/v1.ProjectedVolumeSource", "*core/v1.ProjectedVolumeSource"),
	("core/v1.DownwardAPIVolumeSource", "*core/v1.DownwardAPIVolumeSource"),
	("core/v1.NFSVolumeSource", "*core/v1.NFSVolumeSource"),
	("core/v1.CSIVolumeSource", "*core/v1.CSIVolumeSource"),
];

/// Lists replaced wholesale by the default merge.
const OPAQUE_LISTS: &[&str] = &[
	"[]core/v1.EnvFromSource",
	"[]core/v1.VolumeDevice",
	"[]core/v1.PodReadinessGate",
	"[]core/v1.TopologySpreadConstraint",
];

fn tag(name: &'static str) -> TypeTag {
	TypeTag::from_static(name)
}

/// Shapes of the pod specification and everything it nests.
pub fn pod_spec_schema() -> Schema {
	let mut schema = Schema::new()
		.opaque(QUANTITY)
		.optional(OPT_QUANTITY, QUANTITY)
		.map(RESOURCE_LIST, QUANTITY);

	for (inner, outer) in SUB_RECORDS {
		schema = schema.record(tag(*inner), &[]).optional(tag(*outer), tag(*inner));
	}
	for list in OPAQUE_LISTS {
		schema = schema.opaque(tag(*list));
	}

	schema
		.record(
			CONTAINER_PORT,
			&[
				("name", STRING),
				("hostPort", INT32),
				("containerPort", INT32),
				("protocol", STRING),
				("hostIP", STRING),
			],
		)
		.list(CONTAINER_PORTS, CONTAINER_PORT)
		.record(
			ENV_VAR,
			&[
				("name", STRING),
				("value", STRING),
				("valueFrom", tag("*core/v1.EnvVarSource")),
			],
		)
		.list(ENV_VARS, ENV_VAR)
		.record(
			VOLUME_MOUNT,
			&[
				("name", STRING),
				("readOnly", BOOL),
				("mountPath", STRING),
				("subPath", STRING),
				("mountPropagation", OPT_STRING),
				("subPathExpr", STRING),
			],
		)
		.list(VOLUME_MOUNTS, VOLUME_MOUNT)
		.record(
			RESOURCE_REQUIREMENTS,
			&[("limits", RESOURCE_LIST), ("requests", RESOURCE_LIST)],
		)
		.record(
			CONTAINER,
			&[
				("name", STRING),
				("image", STRING),
				("command", STRING_LIST),
				("args", STRING_LIST),
				("workingDir", STRING),
				("ports", CONTAINER_PORTS),
				("envFrom", tag("[]core/v1.EnvFromSource")),
				("env", ENV_VARS),
				("resources", RESOURCE_REQUIREMENTS),
				("volumeMounts", VOLUME_MOUNTS),
				("volumeDevices", tag("[]core/v1.VolumeDevice")),
				("livenessProbe", tag("*core/v1.Probe")),
				("readinessProbe", tag("*core/v1.Probe")),
				("startupProbe", tag("*core/v1.Probe")),
				("lifecycle", tag("*core/v1.Lifecycle")),
				("terminationMessagePath", STRING),
				("terminationMessagePolicy", STRING),
				("imagePullPolicy", STRING),
				("securityContext", tag("*core/v1.SecurityContext")),
				("stdin", BOOL),
				("stdinOnce", BOOL),
				("tty", BOOL),
			],
		)
		.list(CONTAINERS, CONTAINER)
		.record(
			TOLERATION,
			&[
				("key", STRING),
				("operator", STRING),
				("value", STRING),
				("effect", STRING),
				("tolerationSeconds", OPT_INT64),
			],
		)
		.list(TOLERATIONS, TOLERATION)
		// volume sources are inlined into the volume record
		.record(
			VOLUME,
			&[
				("name", STRING),
				("hostPath", tag("*core/v1.HostPathVolumeSource")),
				("emptyDir", tag("*core/v1.EmptyDirVolumeSource")),
				("secret", tag("*core/v1.SecretVolumeSource")),
				("configMap", tag("*core/v1.ConfigMapVolumeSource")),
				(
					"persistentVolumeClaim",
					tag("*core/v1.PersistentVolumeClaimVolumeSource"),
				),
				("projected", tag("*core/v1.ProjectedVolumeSource")),
				("downwardAPI", tag("*core/v1.DownwardAPIVolumeSource")),
				("nfs", tag("*core/v1.NFSVolumeSource")),
				("csi", tag("*core/v1.CSIVolumeSource")),
			],
		)
		.list(VOLUMES, VOLUME)
		.record(LOCAL_OBJECT_REFERENCE, &[("name", STRING)])
		.list(LOCAL_OBJECT_REFERENCES, LOCAL_OBJECT_REFERENCE)
		.record(HOST_ALIAS, &[("ip", STRING), ("hostnames", STRING_LIST)])
		.list(HOST_ALIASES, HOST_ALIAS)
		.record(
			AFFINITY,
			&[
				("nodeAffinity", tag("*core/v1.NodeAffinity")),
				("podAffinity", tag("*core/v1.PodAffinity")),
				("podAntiAffinity", tag("*core/v1.PodAntiAffinity")),
			],
		)
		.optional(OPT_AFFINITY, AFFINITY)
		.record(
			POD_SPEC_TAG,
			&[
				("volumes", VOLUMES),
				("initContainers", CONTAINERS),
				("containers", CONTAINERS),
				("restartPolicy", STRING),
				("terminationGracePeriodSeconds", OPT_INT64),
				("activeDeadlineSeconds", OPT_INT64),
				("dnsPolicy", STRING),
				("nodeSelector", STRING_MAP),
				("serviceAccountName", STRING),
				("automountServiceAccountToken", OPT_BOOL),
				("nodeName", STRING),
				("hostNetwork", BOOL),
				("hostPID", BOOL),
				("hostIPC", BOOL),
				("shareProcessNamespace", OPT_BOOL),
				("securityContext", tag("*core/v1.PodSecurityContext")),
				("imagePullSecrets", LOCAL_OBJECT_REFERENCES),
				("hostname", STRING),
				("subdomain", STRING),
				("affinity", OPT_AFFINITY),
				("schedulerName", STRING),
				("tolerations", TOLERATIONS),
				("hostAliases", HOST_ALIASES),
				("priorityClassName", STRING),
				("priority", OPT_INT32),
				("dnsConfig", tag("*core/v1.PodDNSConfig")),
				("readinessGates", tag("[]core/v1.PodReadinessGate")),
				("runtimeClassName", OPT_STRING),
				("enableServiceLinks", OPT_BOOL),
				(
					"topologySpreadConstraints",
					tag("[]core/v1.TopologySpreadConstraint"),
				),
			],
		)
}

/// Strategies for merging a desired pod spec over the stored one.
///
/// Containers, ports, env vars, tolerations, volumes, pull secrets, host
/// aliases and mounts merge by key and drop entries the desired spec omits.
pub fn pod_spec_transformers() -> Transformers {
	Transformers::new(pod_spec_schema())
		.with(CONTAINERS, Transformer::merge_list_by_key("name"))
		.with(CONTAINER_PORTS, Transformer::merge_list_by_key("containerPort"))
		.with(ENV_VARS, Transformer::merge_list_by_key("name"))
		.with(ENV_VAR, Transformer::override_fields(&["value", "valueFrom"]))
		.with(TOLERATIONS, Transformer::merge_list_by_key("key"))
		.with(VOLUMES, Transformer::merge_list_by_key("name"))
		.with(VOLUME, Transformer::NilOtherFields)
		.with(LOCAL_OBJECT_REFERENCES, Transformer::merge_list_by_key("name"))
		.with(HOST_ALIASES, Transformer::merge_list_by_key("ip"))
		.with(VOLUME_MOUNTS, Transformer::merge_list_by_key("mountPath"))
		.with(
			AFFINITY,
			Transformer::override_fields(&["nodeAffinity", "podAffinity", "podAntiAffinity"]),
		)
		.with(STRING, Transformer::Overwrite)
		.with(OPT_STRING, Transformer::Overwrite)
		.with(OPT_INT32, Transformer::Overwrite)
		.with(OPT_INT64, Transformer::Overwrite)
		.with(RESOURCE_LIST, Transformer::Overwrite)
		.with(QUANTITY, Transformer::Overwrite)
		.with(OPT_QUANTITY, Transformer::Overwrite)
}

/// Process-wide pod spec registry.
pub static POD_SPEC: Lazy<Transformers> = Lazy::new(pod_spec_transformers);

#[cfg(test)]
#[cfg(feature = "unit-tests")]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::{Value, json};

	use super::*;

	fn base_spec() -> Value {
		json!({
			"containers": [
				{
					"name": "main",
					"image": "main-image",
					"env": [{"name": "TEST", "value": "me"}],
				},
				{
					"name": "helper",
					"image": "helper-image",
					"ports": [
						{"containerPort": 80, "protocol": "TCP"},
						{"containerPort": 8080, "protocol": "TCP"},
					],
				},
			],
		})
	}

	#[test]
	fn removes_unused_containers() {
		let mut spec = base_spec();
		let desired = json!({
			"containers": [{
				"name": "helper",
				"image": "helper-image",
				"ports": [
					{"containerPort": 80, "protocol": "TCP"},
					{"containerPort": 8080, "protocol": "TCP"},
				],
			}],
		});

		POD_SPEC.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		let containers = spec["containers"].as_array().unwrap();
		assert_eq!(containers.len(), 1);
		assert_eq!(containers[0]["name"], "helper");
		assert_eq!(containers[0]["ports"].as_array().unwrap().len(), 2);
	}

	#[test]
	fn renamed_container_replaces_the_old_one() {
		let mut spec = base_spec();
		let desired = json!({
			"containers": [{
				"name": "new-helper",
				"image": "helper-image",
				"ports": [{"containerPort": 80, "protocol": "TCP"}],
			}],
		});

		POD_SPEC.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		let containers = spec["containers"].as_array().unwrap();
		assert_eq!(containers.len(), 1);
		assert_eq!(containers[0]["name"], "new-helper");
		assert_eq!(containers[0]["ports"].as_array().unwrap().len(), 1);
	}

	#[test]
	fn replaces_container_ports() {
		let mut spec = base_spec();
		let mut desired = base_spec();
		desired["containers"][1]["ports"] = json!([{"containerPort": 9125, "protocol": "UDP"}]);

		POD_SPEC.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		let ports = spec["containers"][1]["ports"].as_array().unwrap();
		assert_eq!(ports.len(), 1);
		assert_eq!(ports[0]["containerPort"], 9125);
		assert_eq!(ports[0]["protocol"], "UDP");
	}

	#[test]
	fn env_vars_follow_the_desired_list() {
		let mut spec = base_spec();
		let mut desired = base_spec();
		desired["containers"][0]["env"] = json!([{"name": "TEST-2", "value": "me-2"}]);

		POD_SPEC.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		assert_eq!(
			spec["containers"][0]["env"],
			json!([{"name": "TEST-2", "value": "me-2"}])
		);
	}

	#[test]
	fn env_var_value_from_overrides_value() {
		let mut spec = json!({"containers": [{"name": "main", "env": [{"name": "A", "value": "plain"}]}]});
		let desired = json!({"containers": [{
			"name": "main",
			"env": [{"name": "A", "valueFrom": {"secretKeyRef": {"name": "s", "key": "k"}}}],
		}]});

		POD_SPEC.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		assert_eq!(
			spec["containers"][0]["env"][0],
			json!({"name": "A", "valueFrom": {"secretKeyRef": {"name": "s", "key": "k"}}})
		);
	}

	#[test]
	fn empty_priority_class_name_does_not_erase() {
		let mut spec = json!({"priorityClassName": "high"});

		POD_SPEC
			.merge(&POD_SPEC_TAG, &mut spec, &json!({"priorityClassName": ""}))
			.unwrap();
		assert_eq!(spec["priorityClassName"], "high");

		POD_SPEC
			.merge(&POD_SPEC_TAG, &mut spec, &json!({"priorityClassName": "low"}))
			.unwrap();
		assert_eq!(spec["priorityClassName"], "low");
	}

	#[test]
	fn optional_scalars_can_be_set_to_zero() {
		let mut spec = json!({
			"terminationGracePeriodSeconds": 30,
			"priority": 5,
			"runtimeClassName": "gvisor",
			"tolerations": [{"key": "dedicated", "tolerationSeconds": 300}],
		});
		let desired = json!({
			"terminationGracePeriodSeconds": 0,
			"priority": 0,
			"runtimeClassName": "",
			"tolerations": [{"key": "dedicated", "tolerationSeconds": 0}],
		});

		POD_SPEC.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		assert_eq!(spec, desired);
	}

	#[test]
	fn absent_optional_scalars_are_kept() {
		let mut spec = json!({"terminationGracePeriodSeconds": 30, "priority": 5});

		POD_SPEC
			.merge(&POD_SPEC_TAG, &mut spec, &json!({"hostname": "pod-0"}))
			.unwrap();

		assert_eq!(
			spec,
			json!({"terminationGracePeriodSeconds": 30, "priority": 5, "hostname": "pod-0"})
		);
	}

	#[test]
	fn probes_keep_fields_the_desired_spec_leaves_out() {
		let mut spec = json!({"containers": [{
			"name": "main",
			"livenessProbe": {
				"httpGet": {"path": "/", "port": 80},
				"timeoutSeconds": 1,
				"periodSeconds": 10,
			},
		}]});
		let desired = json!({"containers": [{
			"name": "main",
			"livenessProbe": {"httpGet": {"path": "/healthz", "port": 80}},
		}]});

		POD_SPEC.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		assert_eq!(
			spec["containers"][0]["livenessProbe"],
			json!({
				"httpGet": {"path": "/healthz", "port": 80},
				"timeoutSeconds": 1,
				"periodSeconds": 10,
			})
		);
	}

	#[test]
	fn volume_sources_keep_defaulted_fields() {
		let mut spec = json!({"volumes": [
			{"name": "data", "secret": {"secretName": "creds", "defaultMode": 420}},
		]});
		let desired = json!({"volumes": [{"name": "data", "secret": {"secretName": "creds"}}]});

		POD_SPEC.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		assert_eq!(
			spec["volumes"],
			json!([{"name": "data", "secret": {"secretName": "creds", "defaultMode": 420}}])
		);
	}

	#[test]
	fn volume_source_switch_clears_the_old_source() {
		let mut spec = json!({"volumes": [{"name": "data", "emptyDir": {}}]});
		let desired = json!({"volumes": [{"name": "data", "secret": {"secretName": "creds"}}]});

		POD_SPEC.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		assert_eq!(
			spec["volumes"],
			json!([{"name": "data", "secret": {"secretName": "creds"}}])
		);
	}

	#[test]
	fn resource_lists_are_replaced() {
		let mut spec = json!({"containers": [{
			"name": "main",
			"resources": {"limits": {"cpu": "1", "memory": "1Gi"}},
		}]});
		let desired = json!({"containers": [{
			"name": "main",
			"resources": {"limits": {"cpu": "500m"}, "requests": {"cpu": "100m"}},
		}]});

		POD_SPEC.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		assert_eq!(
			spec["containers"][0]["resources"],
			json!({"limits": {"cpu": "500m"}, "requests": {"cpu": "100m"}})
		);
	}

	#[test]
	fn affinity_terms_are_overridden() {
		let mut spec = json!({"affinity": {
			"nodeAffinity": {"required": true},
			"podAntiAffinity": {"preferred": []},
		}});
		let desired = json!({"affinity": {"podAffinity": {"required": true}}});

		POD_SPEC.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		assert_eq!(spec["affinity"], json!({"podAffinity": {"required": true}}));
	}

	#[test]
	fn absent_lists_are_left_alone() {
		let mut spec = json!({"tolerations": [{"key": "dedicated", "effect": "NoSchedule"}]});
		POD_SPEC
			.merge(&POD_SPEC_TAG, &mut spec, &json!({"hostname": "pod-0"}))
			.unwrap();
		assert_eq!(
			spec,
			json!({
				"tolerations": [{"key": "dedicated", "effect": "NoSchedule"}],
				"hostname": "pod-0",
			})
		);
	}

	#[test]
	fn env_append_mode_keeps_existing_vars() {
		let registry = pod_spec_transformers().with(ENV_VARS, Transformer::append_list_by_key("name"));
		let mut spec = base_spec();
		let mut desired = base_spec();
		desired["containers"][0]["env"] = json!([{"name": "TEST-2", "value": "me-2"}]);

		registry.merge(&POD_SPEC_TAG, &mut spec, &desired).unwrap();

		assert_eq!(
			spec["containers"][0]["env"],
			json!([{"name": "TEST", "value": "me"}, {"name": "TEST-2", "value": "me-2"}])
		);
	}
}
