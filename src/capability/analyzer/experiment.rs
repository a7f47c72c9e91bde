//! Fault-injection experiment template generation

use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

use super::services::TargetService;
use super::AnalyzerSettings;
use crate::scenario::GeneratedScenario;

/// Build the experiment template companion artifact for a scenario
pub fn build(
    scenario: &GeneratedScenario,
    services: &BTreeSet<TargetService>,
    settings: &AnalyzerSettings,
) -> Value {
    let mut actions = Map::new();
    let mut targets = Map::new();
    let tag = |resource_type: &str, selection_mode: &str| {
        json!({
            "resourceType": resource_type,
            "resourceTags": { "Project": settings.project_tag },
            "selectionMode": selection_mode,
        })
    };

    for service in services {
        match service {
            TargetService::Ec2 => {
                actions.insert(
                    "stop-instances".into(),
                    json!({
                        "actionId": "aws:ec2:stop-instances",
                        "description": "Stop EC2 instances",
                        "parameters": { "startInstancesAfterDuration": "PT10M" },
                        "targets": { "Instances": "ec2-instances" },
                    }),
                );
                actions.insert(
                    "reboot-instances".into(),
                    json!({
                        "actionId": "aws:ec2:reboot-instances",
                        "description": "Reboot EC2 instances",
                        "targets": { "Instances": "ec2-instances" },
                    }),
                );
                actions.insert(
                    "cpu-stress".into(),
                    json!({
                        "actionId": "aws:ssm:send-command",
                        "description": "CPU stress test",
                        "parameters": {
                            "documentArn": "arn:aws:ssm:*:*:document/AWSFIS-Run-CPU-Stress",
                            "documentParameters": "{\"DurationSeconds\":\"600\",\"CPU\":\"0\"}",
                            "duration": "PT10M",
                        },
                        "targets": { "Instances": "ec2-instances" },
                    }),
                );
                targets.insert("ec2-instances".into(), tag("aws:ec2:instance", "ALL"));
            }
            TargetService::Rds => {
                actions.insert(
                    "reboot-db-instances".into(),
                    json!({
                        "actionId": "aws:rds:reboot-db-instances",
                        "description": "Reboot RDS instances",
                        "targets": { "DBInstances": "rds-instances" },
                    }),
                );
                actions.insert(
                    "failover-db-cluster".into(),
                    json!({
                        "actionId": "aws:rds:failover-db-cluster",
                        "description": "Fail over RDS clusters",
                        "targets": { "Clusters": "rds-clusters" },
                    }),
                );
                targets.insert("rds-instances".into(), tag("aws:rds:db", "ALL"));
                targets.insert("rds-clusters".into(), tag("aws:rds:cluster", "ALL"));
            }
            TargetService::Lambda => {
                actions.insert(
                    "lambda-add-delay".into(),
                    json!({
                        "actionId": "aws:lambda:invocation-add-delay",
                        "description": "Add invocation delay to Lambda functions",
                        "parameters": { "startupDelayMilliseconds": "5000", "invocationPercentage": "100" },
                        "targets": { "Functions": "lambda-functions" },
                    }),
                );
                actions.insert(
                    "lambda-error-injection".into(),
                    json!({
                        "actionId": "aws:lambda:invocation-error",
                        "description": "Inject Lambda invocation errors",
                        "parameters": { "invocationPercentage": "50" },
                        "targets": { "Functions": "lambda-functions" },
                    }),
                );
                targets.insert("lambda-functions".into(), tag("aws:lambda:function", "ALL"));
            }
            TargetService::Elb => {
                actions.insert(
                    "deregister-targets".into(),
                    json!({
                        "actionId": "aws:elbv2:deregister-targets",
                        "description": "Deregister load balancer targets",
                        "parameters": { "reregisterTargetsAfterDuration": "PT10M" },
                        "targets": { "LoadBalancers": "alb-load-balancers" },
                    }),
                );
                targets.insert(
                    "alb-load-balancers".into(),
                    tag("aws:elbv2:load-balancer", "ALL"),
                );
            }
            TargetService::Ecs => {
                actions.insert(
                    "stop-ecs-tasks".into(),
                    json!({
                        "actionId": "aws:ecs:stop-task",
                        "description": "Stop ECS tasks",
                        "targets": { "Tasks": "ecs-tasks" },
                    }),
                );
                targets.insert("ecs-tasks".into(), tag("aws:ecs:task", "PERCENT(50)"));
            }
            TargetService::Eks => {
                actions.insert(
                    "kill-eks-pods".into(),
                    json!({
                        "actionId": "aws:eks:pod-delete",
                        "description": "Delete EKS pods",
                        "targets": { "Pods": "eks-pods" },
                    }),
                );
                targets.insert("eks-pods".into(), tag("aws:eks:pod", "PERCENT(25)"));
            }
            // No fault actions for the remaining services
            _ => {}
        }
    }

    json!({
        "description": format!("{}: {}", scenario.name, scenario.description),
        "actions": actions,
        "targets": targets,
        "stopConditions": [
            { "source": "aws:cloudwatch:alarm", "value": settings.stop_alarm_arn },
            { "source": "none" },
        ],
        "roleArn": settings.role_arn,
        "tags": {
            "Project": settings.project_tag,
            "Scenario": scenario.name,
            "ScenarioId": scenario.scenario_id,
            "Environment": settings.environment,
        },
    })
}
