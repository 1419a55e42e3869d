//! Istio VirtualService routing `/modelmesh/<namespace>/` to ModelMesh

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::ResourceExt;

use odh_common::crd::{
    Destination, HttpMatchRequest, HttpRewrite, HttpRoute, HttpRouteDestination, InferenceService,
    PortSelector, StringMatch, VirtualService, VirtualServiceSpec,
};
use odh_common::kube_utils::{labels_match, merge_labels};
use odh_common::Result;

use super::{owner_ref, parent_labels, parent_namespace, MODELMESH_SERVICE};
use crate::engine::{ChildAdapter, Desired};
use crate::store::ObjectStore;

/// Gateway serving ODH traffic
pub const ODH_GATEWAY: &str = "opendatahub/odh-gateway";

/// VirtualService adapter
pub struct VirtualServiceAdapter;

#[async_trait]
impl ChildAdapter for VirtualServiceAdapter {
    type Parent = InferenceService;
    type Child = VirtualService;
    type Inputs = ();

    fn name(&self) -> &'static str {
        "VirtualService"
    }

    async fn inputs(&self, _store: &dyn ObjectStore, _parent: &InferenceService) -> Result<()> {
        Ok(())
    }

    fn desired(&self, isvc: &InferenceService, _inputs: ()) -> Result<Desired<VirtualService>> {
        let namespace = parent_namespace(isvc)?;
        let http = HttpRoute {
            r#match: vec![HttpMatchRequest {
                uri: Some(StringMatch {
                    prefix: Some(format!("/modelmesh/{namespace}/")),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            rewrite: Some(HttpRewrite {
                uri: Some("/".to_string()),
                authority: None,
            }),
            route: vec![HttpRouteDestination {
                destination: Destination {
                    host: format!("{MODELMESH_SERVICE}.{namespace}.svc.cluster.local"),
                    subset: None,
                    port: Some(PortSelector { number: 8008 }),
                },
                weight: None,
            }],
            extra: Default::default(),
        };

        Ok(Desired::required(VirtualService {
            metadata: ObjectMeta {
                name: Some(isvc.name_any()),
                namespace: Some(namespace),
                labels: Some(parent_labels(isvc)),
                ..Default::default()
            },
            spec: VirtualServiceSpec {
                gateways: vec![ODH_GATEWAY.to_string()],
                hosts: vec!["*".to_string()],
                http: vec![http],
                extra: Default::default(),
            },
        }))
    }

    fn matches(&self, desired: &VirtualService, observed: &VirtualService) -> bool {
        let (d, o) = (&desired.spec, &observed.spec);
        labels_match(
            desired.metadata.labels.as_ref().unwrap_or(&Default::default()),
            observed.metadata.labels.as_ref(),
        ) && d.gateways == o.gateways
            && d.hosts == o.hosts
            && d.http == o.http
    }

    fn merge(&self, desired: &VirtualService, latest: &mut VirtualService) {
        if let Some(owned) = desired.metadata.labels.as_ref() {
            merge_labels(owned, &mut latest.metadata.labels);
        }
        latest.spec.gateways = desired.spec.gateways.clone();
        latest.spec.hosts = desired.spec.hosts.clone();
        latest.spec.http = desired.spec.http.clone();
    }

    fn owner(&self, isvc: &InferenceService) -> Option<OwnerReference> {
        owner_ref(isvc)
    }
}
