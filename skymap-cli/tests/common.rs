#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub const SNAPSHOT: &str = r#"
account_id: "111122223333"
region: eu-west-1
resources:
  AWS::EC2::VPC:
    - id: vpc-1
      properties: { VpcId: vpc-1, CidrBlock: 10.0.0.0/16 }
  AWS::EC2::VPCPeeringConnection:
    - id: pcx-1
      properties: { Id: pcx-1 }
details:
  - service: ec2
    kind: VpcPeeringConnections
    id: pcx-1
    response:
      VpcPeeringConnections:
        - VpcPeeringConnectionId: pcx-1
          Status: { Code: active }
          AccepterVpcInfo: { OwnerId: "444455556666", VpcId: vpc-9 }
          RequesterVpcInfo: { OwnerId: "111122223333", VpcId: vpc-1 }
"#;

/// Run the `skymap` binary in `dir` with a clean logging environment.
pub fn skymap(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_skymap"))
        .args(args)
        .current_dir(dir)
        .env_remove("SKYMAP_LOG")
        .env_remove("SKYMAP_GRAPH_PATH")
        .env_remove("SKYMAP_REGION")
        .env_remove("SKYMAP_MAX_WORKERS")
        .output()
        .expect("failed to run skymap binary")
}

pub fn write_snapshot(dir: &Path) -> PathBuf {
    let path = dir.join("snapshot.yaml");
    std::fs::write(&path, SNAPSHOT).unwrap();
    path
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
