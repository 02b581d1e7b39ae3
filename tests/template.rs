use ec2_lifecycle_stack::error::BuildError;
use ec2_lifecycle_stack::graph::Graph;
use ec2_lifecycle_stack::render::render_template;
use ec2_lifecycle_stack::spec::StackConfig;
use ec2_lifecycle_stack::stack;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

fn user_data() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "#cloud-config\npackages:\n  - jq").unwrap();
    file
}

fn synth(config: &StackConfig, project: &str, user_data: &Path) -> anyhow::Result<Value> {
    let validated = config.validate_and_build(Some(project))?;
    let mut graph = Graph::new();
    stack::build(&mut graph, &validated, user_data)?;
    let text = render_template(&graph, &validated.description)?;
    Ok(serde_json::from_str(&text)?)
}

fn resources_of<'a>(doc: &'a Value, kind: &str) -> Vec<(&'a String, &'a Value)> {
    doc["Resources"]
        .as_object()
        .unwrap()
        .iter()
        .filter(|(_, r)| r["Type"] == json!(kind))
        .collect()
}

#[test]
fn default_template_matches_expected_shape() {
    let file = user_data();
    let doc = synth(&StackConfig::default(), "demo", file.path()).unwrap();

    assert_eq!(resources_of(&doc, "AWS::EC2::Subnet").len(), 4);
    assert_eq!(resources_of(&doc, "AWS::EC2::Instance").len(), 2);
    assert_eq!(resources_of(&doc, "AWS::EC2::VPCEndpoint").len(), 3);
    assert_eq!(resources_of(&doc, "AWS::Scheduler::Schedule").len(), 2);

    let cidrs: BTreeSet<String> = resources_of(&doc, "AWS::EC2::Subnet")
        .iter()
        .map(|(_, r)| r["Properties"]["CidrBlock"].as_str().unwrap().to_string())
        .collect();
    let expected: BTreeSet<String> = ["10.0.0.0/27", "10.0.0.32/27", "10.0.0.64/27", "10.0.0.96/27"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(cidrs, expected);
}

#[test]
fn schedule_inputs_are_identical() {
    let file = user_data();
    let doc = synth(&StackConfig::default(), "demo", file.path()).unwrap();
    let start = &doc["Resources"]["StartSchedule"]["Properties"]["Target"]["Input"];
    let stop = &doc["Resources"]["StopSchedule"]["Properties"]["Target"]["Input"];
    assert_eq!(start, stop);

    let refs: Vec<&Value> = start["Fn::Join"][1]
        .as_array()
        .unwrap()
        .iter()
        .filter(|v| v.get("Ref").is_some())
        .collect();
    assert_eq!(
        refs,
        vec![&json!({ "Ref": "RelayInstance" }), &json!({ "Ref": "WorkloadInstance" })]
    );
}

#[test]
fn dependencies_and_parameters_resolve() {
    let file = user_data();
    let doc = synth(&StackConfig::default(), "demo", file.path()).unwrap();
    let declared: BTreeSet<&String> = doc["Resources"].as_object().unwrap().keys().collect();
    let params: BTreeSet<&String> = doc["Parameters"].as_object().unwrap().keys().collect();
    for (_, resource) in doc["Resources"].as_object().unwrap() {
        for dep in resource["DependsOn"].as_array().into_iter().flatten() {
            let dep = dep.as_str().unwrap().to_string();
            assert!(declared.contains(&dep), "{dep} missing");
        }
    }
    assert!(params.contains(&"RelayImageId".to_string()));
    assert!(params.contains(&"WorkloadImageId".to_string()));
}

#[test]
fn names_differ_between_projects() {
    let file = user_data();
    let a = synth(&StackConfig::default(), "alpha", file.path()).unwrap();
    let b = synth(&StackConfig::default(), "beta", file.path()).unwrap();
    let role = |doc: &Value| doc["Resources"]["ManagementRole"]["Properties"]["RoleName"].clone();
    assert_eq!(role(&a), json!("alpha-Ec2LifecycleStack-iam_role_for_ssm"));
    assert_eq!(role(&b), json!("beta-Ec2LifecycleStack-iam_role_for_ssm"));
    assert_eq!(a, synth(&StackConfig::default(), "alpha", file.path()).unwrap());
}

#[test]
fn missing_boot_file_emits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let validated = StackConfig::default().validate_and_build(Some("demo")).unwrap();
    let mut graph = Graph::new();
    let err = stack::build(&mut graph, &validated, &dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::BootPayloadUnreadable { .. })
    ));
    assert_eq!(graph.len(), 0);
}
