//! Service lister backed by the Kubernetes API

use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Api, ListParams, ObjectList},
    Client,
};
use opentelemetry::KeyValue;
use tracing::debug;
use unik_common::metrics::SERVICE_LIST_DURATION;
use unik_common::retry::{retry_with_backoff, RetryConfig};
use unik_validator::{AnnotatedService, ListError, ScopeSelector, ServiceLister};

/// Services fetched per list page
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Lists Services straight from the API server.
///
/// Every call reads the current state: there is no cache, so a Service
/// created a moment ago is always seen. Large scopes are read in pages.
#[derive(Clone)]
pub struct KubeServiceLister {
    client: Client,
    page_size: u32,
    retry: RetryConfig,
}

impl KubeServiceLister {
    /// Create a lister using `client`
    pub fn new(client: Client) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryConfig::default(),
        }
    }

    /// Override the page size (minimum 1)
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn api(&self, selector: &ScopeSelector) -> Api<Service> {
        match selector.namespace() {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait]
impl ServiceLister for KubeServiceLister {
    async fn list(&self, selector: &ScopeSelector) -> Result<Vec<AnnotatedService>, ListError> {
        let api = self.api(selector);
        let api = &api;
        let page_size = self.page_size;
        let started = Instant::now();

        let (services, pages) = collect_pages(&self.retry, |continue_token| async move {
            let mut params = ListParams::default().limit(page_size);
            if let Some(token) = &continue_token {
                params = params.continue_token(token);
            }
            api.list(&params).await.map(Page::from)
        })
        .await?;

        let elapsed = started.elapsed();
        SERVICE_LIST_DURATION.record(
            elapsed.as_secs_f64(),
            &[KeyValue::new("scope_kind", scope_kind(selector))],
        );
        debug!(
            selector = %selector,
            services = services.len(),
            pages,
            elapsed_ms = elapsed.as_millis(),
            "Listed services"
        );

        Ok(services)
    }
}

/// One page of a list response
#[derive(Debug, Default)]
struct Page {
    services: Vec<AnnotatedService>,
    continue_token: Option<String>,
}

impl From<ObjectList<Service>> for Page {
    fn from(list: ObjectList<Service>) -> Self {
        Self {
            services: list.items.iter().map(AnnotatedService::from).collect(),
            continue_token: list.metadata.continue_,
        }
    }
}

/// Fetch pages until the server stops handing out continue tokens.
///
/// Each page request is retried on its own, so a transient failure midway
/// resumes from the same token. Returns the Services and the page count.
async fn collect_pages<F, Fut>(
    retry: &RetryConfig,
    mut fetch: F,
) -> Result<(Vec<AnnotatedService>, u32), kube::Error>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page, kube::Error>>,
{
    let mut services = Vec::new();
    let mut continue_token: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let page = retry_with_backoff(retry, "list_services", is_transient, || {
            fetch(continue_token.clone())
        })
        .await?;
        pages += 1;
        services.extend(page.services);

        // the API server signals the last page with an absent or empty token
        match page.continue_token {
            Some(token) if !token.is_empty() => continue_token = Some(token),
            _ => return Ok((services, pages)),
        }
    }
}

fn scope_kind(selector: &ScopeSelector) -> &'static str {
    match selector {
        ScopeSelector::AllNamespaces => "cluster",
        ScopeSelector::Namespace(_) => "namespace",
    }
}

/// Whether a failed list call is worth repeating
fn is_transient(error: &kube::Error) -> bool {
    match error {
        kube::Error::Api(response) => response.code == 429 || response.code >= 500,
        kube::Error::HyperError(_) | kube::Error::Service(_) => true,
        _ => false,
    }
}
