//! Target service detection

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::scenario::GeneratedScenario;

/// Cloud services a scenario can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetService {
    Ec2,
    Rds,
    S3,
    Lambda,
    Elb,
    Vpc,
    Iam,
    CloudWatch,
    Sns,
    Sqs,
    DynamoDb,
    Ecs,
    Eks,
    ApiGateway,
    StepFunctions,
}

impl TargetService {
    pub const ALL: [TargetService; 15] = [
        TargetService::Ec2,
        TargetService::Rds,
        TargetService::S3,
        TargetService::Lambda,
        TargetService::Elb,
        TargetService::Vpc,
        TargetService::Iam,
        TargetService::CloudWatch,
        TargetService::Sns,
        TargetService::Sqs,
        TargetService::DynamoDb,
        TargetService::Ecs,
        TargetService::Eks,
        TargetService::ApiGateway,
        TargetService::StepFunctions,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            TargetService::Ec2 => "EC2",
            TargetService::Rds => "RDS",
            TargetService::S3 => "S3",
            TargetService::Lambda => "Lambda",
            TargetService::Elb => "ELB",
            TargetService::Vpc => "VPC",
            TargetService::Iam => "IAM",
            TargetService::CloudWatch => "CloudWatch",
            TargetService::Sns => "SNS",
            TargetService::Sqs => "SQS",
            TargetService::DynamoDb => "DynamoDB",
            TargetService::Ecs => "ECS",
            TargetService::Eks => "EKS",
            TargetService::ApiGateway => "API Gateway",
            TargetService::StepFunctions => "Step Functions",
        }
    }

    /// Parse an explicitly declared service name, ignoring case and separators
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let service = match normalized.as_str() {
            "ec2" => TargetService::Ec2,
            "rds" | "aurora" => TargetService::Rds,
            "s3" => TargetService::S3,
            "lambda" => TargetService::Lambda,
            "elb" | "alb" | "nlb" | "elbv2" => TargetService::Elb,
            "vpc" => TargetService::Vpc,
            "iam" => TargetService::Iam,
            "cloudwatch" => TargetService::CloudWatch,
            "sns" => TargetService::Sns,
            "sqs" => TargetService::Sqs,
            "dynamodb" => TargetService::DynamoDb,
            "ecs" => TargetService::Ecs,
            "eks" => TargetService::Eks,
            "apigateway" => TargetService::ApiGateway,
            "stepfunctions" | "sfn" => TargetService::StepFunctions,
            _ => return None,
        };
        Some(service)
    }
}

impl fmt::Display for TargetService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

static SERVICE_PATTERNS: Lazy<Vec<(TargetService, Regex)>> = Lazy::new(|| {
    [
        (TargetService::Ec2, r"(?i)\b(ec2|elastic\s+compute|virtual\s+machines?|instances?)\b"),
        (TargetService::Rds, r"(?i)\b(rds|databases?|mysql|postgresql|aurora)\b"),
        (TargetService::S3, r"(?i)\b(s3|simple\s+storage|buckets?|object\s+storage)\b"),
        (TargetService::Lambda, r"(?i)\b(lambda|serverless)\b"),
        (TargetService::Elb, r"(?i)\b(elb|alb|elastic\s+load\s+balancer|load\s+balancers?)\b"),
        (TargetService::Vpc, r"(?i)\b(vpc|virtual\s+private\s+cloud|subnets?)\b"),
        (TargetService::Iam, r"(?i)\b(iam|identity\s+and\s+access|access\s+management)\b"),
        (TargetService::CloudWatch, r"(?i)\b(cloudwatch|monitoring|metrics|alarms?)\b"),
        (TargetService::Sns, r"(?i)\b(sns|simple\s+notification|notifications?)\b"),
        (TargetService::Sqs, r"(?i)\b(sqs|simple\s+queue|queues?)\b"),
        (TargetService::DynamoDb, r"(?i)\b(dynamodb|nosql|document\s+database)\b"),
        (TargetService::Ecs, r"(?i)\b(ecs|elastic\s+container|containers?)\b"),
        (TargetService::Eks, r"(?i)\b(eks|kubernetes|k8s|pods?)\b"),
        (TargetService::ApiGateway, r"(?i)\b(api\s+gateway|rest\s+api)\b"),
        (TargetService::StepFunctions, r"(?i)\b(step\s+functions|state\s+machines?)\b"),
    ]
    .into_iter()
    .map(|(service, pattern)| (service, Regex::new(pattern).expect("Invalid regex pattern")))
    .collect()
});

/// Collect the services a scenario targets: declared ones plus keyword matches
pub fn extract(scenario: &GeneratedScenario) -> BTreeSet<TargetService> {
    let mut services: BTreeSet<TargetService> = scenario
        .target_services()
        .into_iter()
        .filter_map(TargetService::from_name)
        .collect();

    let text = format!(
        "{}\n{}\n{}\n{}",
        scenario.name,
        scenario.category,
        scenario.description,
        serde_json::Value::Object(scenario.body.clone())
    );
    for (service, pattern) in SERVICE_PATTERNS.iter() {
        if pattern.is_match(&text) {
            services.insert(*service);
        }
    }
    services
}
