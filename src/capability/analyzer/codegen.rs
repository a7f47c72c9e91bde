//! CDK stack code generation

use serde::Serialize;
use std::collections::BTreeSet;
use tera::{Context, Tera};

use super::services::TargetService;
use crate::scenario::GeneratedScenario;

const STACK_TEMPLATE_NAME: &str = "stack.ts";

const STACK_TEMPLATE: &str = r#"{% for line in imports %}{{ line }}
{% endfor %}
export interface {{ class_name }}Props extends cdk.StackProps {
  readonly environment?: string;
}

export class {{ class_name }} extends cdk.Stack {
  constructor(scope: Construct, id: string, props?: {{ class_name }}Props) {
    super(scope, id, props);

    // Generated resources for {{ scenario_comment }}
{% if has.vpc %}
    const vpc = new ec2.Vpc(this, '{{ safe_name }}Vpc', {
      maxAzs: 2,
      subnetConfiguration: [
        { cidrMask: 24, name: 'public', subnetType: ec2.SubnetType.PUBLIC },
        { cidrMask: 24, name: 'private', subnetType: ec2.SubnetType.PRIVATE_WITH_EGRESS },
      ],
    });
{% endif %}{% if has.ec2 %}
    const securityGroup = new ec2.SecurityGroup(this, '{{ safe_name }}SecurityGroup', {
      vpc,
      description: 'Security group for {{ safe_name }} chaos engineering test',
      allowAllOutbound: true,
    });

    new ec2.Instance(this, '{{ safe_name }}Instance', {
      instanceType: ec2.InstanceType.of(ec2.InstanceClass.T3, ec2.InstanceSize.MICRO),
      machineImage: ec2.MachineImage.latestAmazonLinux2(),
      vpc,
      securityGroup,
      vpcSubnets: { subnetType: ec2.SubnetType.PUBLIC },
    });
{% endif %}{% if has.rds %}
    new rds.DatabaseInstance(this, '{{ safe_name }}Database', {
      engine: rds.DatabaseInstanceEngine.mysql({ version: rds.MysqlEngineVersion.VER_8_0 }),
      instanceType: ec2.InstanceType.of(ec2.InstanceClass.T3, ec2.InstanceSize.MICRO),
      vpc,
      credentials: rds.Credentials.fromGeneratedSecret('admin'),
      multiAz: false,
      allocatedStorage: 20,
      deleteAutomatedBackups: true,
      deletionProtection: false,
      removalPolicy: cdk.RemovalPolicy.DESTROY,
    });
{% endif %}{% if has.s3 %}
    new s3.Bucket(this, '{{ safe_name }}Bucket', {
      bucketName: `{{ lower_name }}-chaos-test-${cdk.Aws.ACCOUNT_ID}-${cdk.Aws.REGION}`,
      removalPolicy: cdk.RemovalPolicy.DESTROY,
      autoDeleteObjects: true,
      versioned: true,
      encryption: s3.BucketEncryption.S3_MANAGED,
    });
{% endif %}{% if has.lambda %}
    new lambda.Function(this, '{{ safe_name }}Function', {
      runtime: lambda.Runtime.PYTHON_3_12,
      handler: 'index.handler',
      code: lambda.Code.fromInline("def handler(event, context):\n    return {'statusCode': 200}\n"),
      timeout: cdk.Duration.seconds(30),
      memorySize: 128,
    });
{% endif %}{% if has.elb %}
    const loadBalancer = new elbv2.ApplicationLoadBalancer(this, '{{ safe_name }}LoadBalancer', {
      vpc,
      internetFacing: true,
    });
    loadBalancer.addListener('{{ safe_name }}Listener', { port: 80, open: true });
{% endif %}{% if has.cloudwatch %}
    new cloudwatch.Dashboard(this, '{{ safe_name }}Dashboard', {
      dashboardName: '{{ lower_name }}-chaos-dashboard',
    });
{% endif %}{% if has.sns %}
    new sns.Topic(this, '{{ safe_name }}Topic', {
      displayName: '{{ safe_name }} Chaos Engineering Notifications',
    });
{% endif %}{% if has.sqs %}
    new sqs.Queue(this, '{{ safe_name }}Queue', {
      visibilityTimeout: cdk.Duration.seconds(300),
    });
{% endif %}{% if has.dynamodb %}
    new dynamodb.Table(this, '{{ safe_name }}Table', {
      partitionKey: { name: 'id', type: dynamodb.AttributeType.STRING },
      billingMode: dynamodb.BillingMode.PAY_PER_REQUEST,
      removalPolicy: cdk.RemovalPolicy.DESTROY,
    });
{% endif %}
    cdk.Tags.of(this).add('Project', '{{ project_tag }}');
    cdk.Tags.of(this).add('Scenario', '{{ scenario_literal }}');
    cdk.Tags.of(this).add('Environment', props?.environment || '{{ environment }}');
  }
}
"#;

#[derive(Debug, Default, Serialize)]
struct ResourceFlags {
    vpc: bool,
    ec2: bool,
    rds: bool,
    s3: bool,
    lambda: bool,
    elb: bool,
    cloudwatch: bool,
    sns: bool,
    sqs: bool,
    dynamodb: bool,
}

impl ResourceFlags {
    fn from_services(services: &BTreeSet<TargetService>) -> Self {
        let has = |service| services.contains(&service);
        Self {
            vpc: has(TargetService::Vpc)
                || has(TargetService::Ec2)
                || has(TargetService::Rds)
                || has(TargetService::Elb),
            ec2: has(TargetService::Ec2),
            rds: has(TargetService::Rds),
            s3: has(TargetService::S3),
            lambda: has(TargetService::Lambda),
            elb: has(TargetService::Elb),
            cloudwatch: has(TargetService::CloudWatch),
            sns: has(TargetService::Sns),
            sqs: has(TargetService::Sqs),
            dynamodb: has(TargetService::DynamoDb),
        }
    }

    fn imports(&self) -> Vec<&'static str> {
        let mut imports = vec![
            "import * as cdk from 'aws-cdk-lib';",
            "import { Construct } from 'constructs';",
        ];
        let optional = [
            (self.vpc, "import * as ec2 from 'aws-cdk-lib/aws-ec2';"),
            (self.rds, "import * as rds from 'aws-cdk-lib/aws-rds';"),
            (self.s3, "import * as s3 from 'aws-cdk-lib/aws-s3';"),
            (self.lambda, "import * as lambda from 'aws-cdk-lib/aws-lambda';"),
            (
                self.elb,
                "import * as elbv2 from 'aws-cdk-lib/aws-elasticloadbalancingv2';",
            ),
            (
                self.cloudwatch,
                "import * as cloudwatch from 'aws-cdk-lib/aws-cloudwatch';",
            ),
            (self.sns, "import * as sns from 'aws-cdk-lib/aws-sns';"),
            (self.sqs, "import * as sqs from 'aws-cdk-lib/aws-sqs';"),
            (
                self.dynamodb,
                "import * as dynamodb from 'aws-cdk-lib/aws-dynamodb';",
            ),
        ];
        imports.extend(optional.into_iter().filter(|(on, _)| *on).map(|(_, line)| line));
        imports.sort_unstable();
        imports
    }
}

/// Renders a TypeScript CDK stack for a scenario
pub struct StackRenderer {
    tera: Tera,
}

impl StackRenderer {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template(STACK_TEMPLATE_NAME, STACK_TEMPLATE)?;
        Ok(Self { tera })
    }

    /// Render the stack. Output depends only on the inputs so retries reproduce it exactly.
    pub fn render(
        &self,
        scenario: &GeneratedScenario,
        services: &BTreeSet<TargetService>,
        project_tag: &str,
        environment: &str,
    ) -> Result<String, tera::Error> {
        let flags = ResourceFlags::from_services(services);
        let safe_name = scenario.safe_name();

        let mut context = Context::new();
        context.insert("imports", &flags.imports());
        context.insert("class_name", &format!("{}Stack", safe_name));
        context.insert("lower_name", &safe_name.to_ascii_lowercase());
        context.insert("safe_name", &safe_name);
        context.insert("scenario_comment", &scenario.name.replace(['\n', '\r'], " "));
        context.insert("scenario_literal", &ts_string_literal(&scenario.name));
        context.insert("project_tag", &ts_string_literal(project_tag));
        context.insert("environment", &ts_string_literal(environment));
        context.insert("has", &flags);

        self.tera.render(STACK_TEMPLATE_NAME, &context)
    }
}

/// Escape text for use inside a single-quoted TypeScript string
fn ts_string_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn scenario(name: &str) -> GeneratedScenario {
        GeneratedScenario {
            scenario_id: "scn-1".into(),
            name: name.into(),
            category: "resilience".into(),
            description: "d".into(),
            body: Map::new(),
        }
    }

    #[test]
    fn test_render_includes_selected_resources() {
        let renderer = StackRenderer::new().unwrap();
        let services: BTreeSet<_> = [TargetService::Rds, TargetService::Sqs].into_iter().collect();
        let code = renderer
            .render(&scenario("db outage"), &services, "ChaosEngineering", "test")
            .unwrap();

        assert!(code.contains("export class dboutageStack extends cdk.Stack"));
        assert!(code.contains("new rds.DatabaseInstance"));
        assert!(code.contains("new sqs.Queue"));
        // RDS needs a VPC and the ec2 module
        assert!(code.contains("const vpc = new ec2.Vpc"));
        assert!(code.contains("import * as ec2 from 'aws-cdk-lib/aws-ec2';"));
        assert!(!code.contains("new lambda.Function"));
        assert!(code.contains("cdk.Tags.of(this).add('Project', 'ChaosEngineering');"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = StackRenderer::new().unwrap();
        let services: BTreeSet<_> = TargetService::ALL.into_iter().collect();
        let first = renderer
            .render(&scenario("all"), &services, "ChaosEngineering", "test")
            .unwrap();
        let second = renderer
            .render(&scenario("all"), &services, "ChaosEngineering", "test")
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_scenario_name_is_escaped() {
        let renderer = StackRenderer::new().unwrap();
        let code = renderer
            .render(&scenario("it's broken"), &BTreeSet::new(), "ChaosEngineering", "test")
            .unwrap();
        assert!(code.contains("add('Scenario', 'it\\'s broken')"));
        assert!(!code.contains("const vpc"));
    }
}
