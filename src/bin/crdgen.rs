use grafana_operator::schema::{GrafanaOrganization, GrafanaTeam};
use kube::CustomResourceExt;

fn main() {
    println!("{}", serde_yaml::to_string(&GrafanaOrganization::crd()).unwrap());
    println!("---\n{}", serde_yaml::to_string(&GrafanaTeam::crd()).unwrap());
}
