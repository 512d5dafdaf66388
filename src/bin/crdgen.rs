use kube::CustomResourceExt;
use observability_operator::crd::ObservabilityStack;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&ObservabilityStack::crd())?);
    Ok(())
}
