// Graph data model: cloud resources as nodes, relationships as edges

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of cloud resource a node stands for.
///
/// The set is open: kinds the enumerator adds later land in [`NodeType::Other`]
/// and keep their wire name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Vpc,
    Subnet,
    Instance,
    SecurityGroup,
    RouteTable,
    Igw,
    NatGateway,
    Eni,
    LoadBalancer,
    TargetGroup,
    Lambda,
    ApiGw,
    ApiGwV2,
    RdsInstance,
    DynamodbTable,
    SqsQueue,
    SnsTopic,
    KinesisStream,
    EcsCluster,
    EcsService,
    EcrRepo,
    Cloudfront,
    Route53Zone,
    Opensearch,
    Elasticache,
    MskCluster,
    S3Bucket,
    Cidr,
    PrefixList,
    External,
    Account,
    Region,
    Other(String),
}

impl NodeType {
    pub const KNOWN: [NodeType; 32] = [
        NodeType::Vpc,
        NodeType::Subnet,
        NodeType::Instance,
        NodeType::SecurityGroup,
        NodeType::RouteTable,
        NodeType::Igw,
        NodeType::NatGateway,
        NodeType::Eni,
        NodeType::LoadBalancer,
        NodeType::TargetGroup,
        NodeType::Lambda,
        NodeType::ApiGw,
        NodeType::ApiGwV2,
        NodeType::RdsInstance,
        NodeType::DynamodbTable,
        NodeType::SqsQueue,
        NodeType::SnsTopic,
        NodeType::KinesisStream,
        NodeType::EcsCluster,
        NodeType::EcsService,
        NodeType::EcrRepo,
        NodeType::Cloudfront,
        NodeType::Route53Zone,
        NodeType::Opensearch,
        NodeType::Elasticache,
        NodeType::MskCluster,
        NodeType::S3Bucket,
        NodeType::Cidr,
        NodeType::PrefixList,
        NodeType::External,
        NodeType::Account,
        NodeType::Region,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Vpc => "vpc",
            NodeType::Subnet => "subnet",
            NodeType::Instance => "instance",
            NodeType::SecurityGroup => "security_group",
            NodeType::RouteTable => "route_table",
            NodeType::Igw => "igw",
            NodeType::NatGateway => "nat_gateway",
            NodeType::Eni => "eni",
            NodeType::LoadBalancer => "load_balancer",
            NodeType::TargetGroup => "target_group",
            NodeType::Lambda => "lambda",
            NodeType::ApiGw => "api_gw",
            NodeType::ApiGwV2 => "api_gw_v2",
            NodeType::RdsInstance => "rds_instance",
            NodeType::DynamodbTable => "dynamodb_table",
            NodeType::SqsQueue => "sqs_queue",
            NodeType::SnsTopic => "sns_topic",
            NodeType::KinesisStream => "kinesis_stream",
            NodeType::EcsCluster => "ecs_cluster",
            NodeType::EcsService => "ecs_service",
            NodeType::EcrRepo => "ecr_repo",
            NodeType::Cloudfront => "cloudfront",
            NodeType::Route53Zone => "route53_zone",
            NodeType::Opensearch => "opensearch",
            NodeType::Elasticache => "elasticache",
            NodeType::MskCluster => "msk_cluster",
            NodeType::S3Bucket => "s3_bucket",
            NodeType::Cidr => "cidr",
            NodeType::PrefixList => "prefix_list",
            NodeType::External => "external",
            NodeType::Account => "account",
            NodeType::Region => "region",
            NodeType::Other(name) => name.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_lowercase();
        NodeType::KNOWN
            .iter()
            .find(|t| t.as_str() == normalized)
            .cloned()
            .unwrap_or(NodeType::Other(normalized))
    }

    /// Human readable name used by the legend.
    pub fn display_name(&self) -> String {
        match self {
            NodeType::Vpc => "VPC".to_string(),
            NodeType::Igw => "Internet Gateway".to_string(),
            NodeType::NatGateway => "NAT Gateway".to_string(),
            NodeType::Eni => "ENI".to_string(),
            NodeType::ApiGw => "API Gateway".to_string(),
            NodeType::ApiGwV2 => "API Gateway v2".to_string(),
            NodeType::RdsInstance => "RDS Instance".to_string(),
            NodeType::DynamodbTable => "DynamoDB Table".to_string(),
            NodeType::SqsQueue => "SQS Queue".to_string(),
            NodeType::SnsTopic => "SNS Topic".to_string(),
            NodeType::EcsCluster => "ECS Cluster".to_string(),
            NodeType::EcsService => "ECS Service".to_string(),
            NodeType::EcrRepo => "ECR Repository".to_string(),
            NodeType::Cloudfront => "CloudFront".to_string(),
            NodeType::Route53Zone => "Route 53 Zone".to_string(),
            NodeType::Opensearch => "OpenSearch".to_string(),
            NodeType::MskCluster => "MSK Cluster".to_string(),
            NodeType::S3Bucket => "S3 Bucket".to_string(),
            NodeType::Cidr => "CIDR".to_string(),
            other => title_case(other.as_str()),
        }
    }
}

impl From<String> for NodeType {
    fn from(value: String) -> Self {
        NodeType::parse(&value)
    }
}

impl From<NodeType> for String {
    fn from(value: NodeType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Coarse edge classification, drives colour and the visibility toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeCategory {
    Resource,
    Network,
    Data,
}

impl EdgeCategory {
    pub const ALL: [EdgeCategory; 3] = [
        EdgeCategory::Resource,
        EdgeCategory::Network,
        EdgeCategory::Data,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeCategory::Resource => "resource",
            EdgeCategory::Network => "network",
            EdgeCategory::Data => "data",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "resource" => Some(EdgeCategory::Resource),
            "network" => Some(EdgeCategory::Network),
            "data" => Some(EdgeCategory::Data),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub node_type: NodeType,
    pub label: String,
    pub parent: Option<String>,
    /// Opaque backend data (`region`, `account_id`, `details`, ...), shown by the inspector.
    pub attributes: Map<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            label: label.into(),
            parent: None,
            attributes: Map::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// The node as a flat data map, in the same shape the backend sends it.
    pub fn to_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("id".into(), Value::String(self.id.clone()));
        data.insert("type".into(), Value::String(self.node_type.to_string()));
        data.insert("label".into(), Value::String(self.label.clone()));
        if let Some(ref parent) = self.parent {
            data.insert("parent".into(), Value::String(parent.clone()));
        }
        for (key, value) in &self.attributes {
            data.entry(key.clone()).or_insert_with(|| value.clone());
        }
        data
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    category: EdgeCategory,
    /// Free-form within the category: attach, assoc, route, sg-rule, invoke, ...
    pub edge_type: String,
    pub derived: bool,
    pub label: String,
    pub attributes: Map<String, Value>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        category: EdgeCategory,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            category,
            edge_type: String::new(),
            derived: false,
            label: String::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_type(mut self, edge_type: impl Into<String>) -> Self {
        self.edge_type = edge_type.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_derived(mut self, derived: bool) -> Self {
        self.derived = derived;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Fixed at construction.
    pub fn category(&self) -> EdgeCategory {
        self.category
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    pub fn to_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("id".into(), Value::String(self.id.clone()));
        data.insert("source".into(), Value::String(self.source.clone()));
        data.insert("target".into(), Value::String(self.target.clone()));
        data.insert(
            "category".into(),
            Value::String(self.category.as_str().to_string()),
        );
        data.insert("type".into(), Value::String(self.edge_type.clone()));
        data.insert("derived".into(), Value::Bool(self.derived));
        data.insert("label".into(), Value::String(self.label.clone()));
        for (key, value) in &self.attributes {
            data.entry(key.clone()).or_insert_with(|| value.clone());
        }
        data
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Node,
    Edge,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Edge => "edge",
        }
    }
}

/// Borrowed view of either element kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementRef<'a> {
    Node(&'a Node),
    Edge(&'a Edge),
}

impl<'a> ElementRef<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            ElementRef::Node(n) => &n.id,
            ElementRef::Edge(e) => &e.id,
        }
    }

    pub fn label(&self) -> &'a str {
        match self {
            ElementRef::Node(n) => &n.label,
            ElementRef::Edge(e) => &e.label,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            ElementRef::Node(_) => ElementKind::Node,
            ElementRef::Edge(_) => ElementKind::Edge,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, ElementRef::Node(_))
    }

    pub fn as_node(&self) -> Option<&'a Node> {
        match self {
            ElementRef::Node(n) => Some(n),
            ElementRef::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&'a Edge> {
        match self {
            ElementRef::Edge(e) => Some(e),
            ElementRef::Node(_) => None,
        }
    }

    pub fn to_data(&self) -> Map<String, Value> {
        match self {
            ElementRef::Node(n) => n.to_data(),
            ElementRef::Edge(e) => e.to_data(),
        }
    }
}
