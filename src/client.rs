use anyhow::Result as AnyResult;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::ResourceError;
use crate::identifier::validate;
use crate::poll::{CancelToken, PollingPolicy, ReadinessProbe, Sleeper, Wait, await_ready};
use crate::resource::{Document, ResourceKind, ResourceType, resource_id};
use crate::status::{self, Readiness};
use crate::transport::{HttpTransport, Transport};

pub type Result<T> = std::result::Result<T, ResourceError>;

/// Create, read, update, delete and list resources of one [`ResourceKind`].
pub struct ResourceClient<T = HttpTransport> {
    kind: ResourceKind,
    transport: T,
    policy: PollingPolicy,
    progress: bool,
    probes: HashMap<ResourceType, Box<dyn ReadinessProbe + Send + Sync>>,
}

impl ResourceClient<HttpTransport> {
    /// Creates a client using environment variables and/or `.bigmlrc`.
    pub fn from_env(kind: ResourceKind) -> AnyResult<Self> {
        Self::new(kind, ClientConfig::from_env()?)
    }

    pub fn new(kind: ResourceKind, config: ClientConfig) -> AnyResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(kind, transport)
            .with_policy(config.policy)
            .with_progress(true))
    }
}

impl<T: Transport> ResourceClient<T> {
    pub fn with_transport(kind: ResourceKind, transport: T) -> Self {
        Self {
            kind,
            transport,
            policy: PollingPolicy::default(),
            progress: false,
            probes: HashMap::new(),
        }
    }

    /// Default dependency wait for `create` calls that pass no policy.
    pub fn with_policy(mut self, policy: PollingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Show a spinner while waiting for a dependency.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Registers how readiness of `dependency`-typed resources is checked.
    ///
    /// Without a probe, the dependency is fetched through the transport and
    /// its status interpreted.
    pub fn with_probe<P>(mut self, dependency: ResourceType, probe: P) -> Self
    where
        P: ReadinessProbe + Send + Sync + 'static,
    {
        self.probes.insert(dependency, Box::new(probe));
        self
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn policy(&self) -> PollingPolicy {
        self.policy
    }

    /// Whether `document` is a resource of this client's type.
    pub fn is_instance(&self, document: &Document) -> bool {
        validate(resource_id(document), self.kind.resource.pattern())
    }

    /// Creates a resource from `dependency_id`, waiting for the dependency first.
    ///
    /// The wait is best-effort: if the dependency is still not ready once the
    /// policy is spent, the request is sent anyway and the server decides.
    pub fn create(
        &self,
        dependency_id: &str,
        input: Option<&Document>,
        args: Option<&Document>,
        policy: Option<PollingPolicy>,
    ) -> Result<Document> {
        self.create_with(dependency_id, input, args, policy, &CancelToken::new())
    }

    /// Like [`create`](Self::create), suspending through `sleeper` between probes.
    ///
    /// Pass a [`CancelToken`] to be able to abort the wait from another thread.
    pub fn create_with(
        &self,
        dependency_id: &str,
        input: Option<&Document>,
        args: Option<&Document>,
        policy: Option<PollingPolicy>,
        sleeper: &dyn Sleeper,
    ) -> Result<Document> {
        let dependency_id = self.check_id(self.kind.dependency, dependency_id)?;
        let policy = policy.unwrap_or(self.policy);

        let spinner = self.spinner(dependency_id, &policy);
        let outcome = await_ready(
            || {
                if let Some(pb) = &spinner {
                    pb.inc(1);
                }
                self.dependency_ready(dependency_id)
            },
            &policy,
            sleeper,
        );
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        match outcome? {
            Wait::Skipped => tracing::debug!(dependency = dependency_id, "dependency wait skipped"),
            Wait::Ready { attempts } => {
                tracing::debug!(dependency = dependency_id, attempts, "dependency ready")
            }
            Wait::Exhausted { attempts: 0 } => {}
            Wait::Exhausted { attempts } => {
                let not_ready = ResourceError::DependencyNotReady {
                    id: dependency_id.to_string(),
                    attempts,
                };
                tracing::warn!("{}; sending the create request anyway", not_ready);
            }
        }

        if sleeper.cancelled() {
            return Err(ResourceError::Cancelled);
        }

        let body = self.build_request(dependency_id, input, args);
        let endpoint = self.kind.endpoint();
        self.transport
            .create_resource(endpoint, &body)
            .map_err(|e| failed("create", endpoint, e))
    }

    pub fn get(&self, id: &str) -> Result<Document> {
        let id = self.check_id(self.kind.resource, id)?;
        self.transport
            .get_resource(id)
            .map_err(|e| failed("get", id, e))
    }

    /// Re-fetches the resource a held document refers to.
    pub fn get_document(&self, document: &Document) -> Result<Document> {
        self.get(self.id_of(document)?)
    }

    /// Three-way readiness of the resource, fetched fresh.
    pub fn readiness(&self, id: &str) -> Result<Readiness> {
        self.get(id).map(|d| status::verdict(&d))
    }

    /// Whether the resource is finished. Any failure reads as not ready.
    pub fn is_ready(&self, id: &str) -> bool {
        matches!(self.readiness(id), Ok(Readiness::Ready))
    }

    /// True straight away for a document of this kind that is already
    /// finished; otherwise the resource is fetched again once by its id.
    /// Documents of another resource type are never ready.
    pub fn is_ready_document(&self, document: &Document) -> bool {
        if !self.is_instance(document) {
            return false;
        }
        if status::is_finished(document) {
            return true;
        }
        match resource_id(document) {
            Some(id) => self.is_ready(id),
            None => false,
        }
    }

    /// Lists resources of this kind. `query` is passed through untouched,
    /// e.g. `limit=10;offset=20`.
    pub fn list(&self, query: &str) -> Result<Document> {
        let endpoint = self.kind.endpoint();
        self.transport
            .list_resources(endpoint, query)
            .map_err(|e| failed("list", endpoint, e))
    }

    pub fn update(&self, id: &str, changes: &Document) -> Result<Document> {
        let id = self.check_id(self.kind.resource, id)?;
        self.transport
            .update_resource(id, changes)
            .map_err(|e| failed("update", id, e))
    }

    pub fn update_document(&self, document: &Document, changes: &Document) -> Result<Document> {
        self.update(self.id_of(document)?, changes)
    }

    pub fn delete(&self, id: &str) -> Result<Document> {
        let id = self.check_id(self.kind.resource, id)?;
        self.transport
            .delete_resource(id)
            .map_err(|e| failed("delete", id, e))
    }

    pub fn delete_document(&self, document: &Document) -> Result<Document> {
        self.delete(self.id_of(document)?)
    }

    /// Polls a resource of this kind until it is finished.
    ///
    /// Returns the finished document, [`ResourceError::Faulty`] as soon as the
    /// resource reports a failure status, or
    /// [`ResourceError::NotReady`] when the policy runs out. A zero
    /// interval checks once without waiting.
    pub fn wait_ready(
        &self,
        id: &str,
        policy: Option<PollingPolicy>,
        sleeper: &dyn Sleeper,
    ) -> Result<Document> {
        let id = self.check_id(self.kind.resource, id)?;
        let policy = policy.unwrap_or(self.policy);

        let mut last = None;
        let outcome = await_ready(
            || {
                let doc = self.transport.get_resource(id)?;
                let settled = !matches!(status::verdict(&doc), Readiness::Pending(_));
                last = Some(doc);
                Ok(settled)
            },
            &policy,
            sleeper,
        )?;

        let (last, attempts) = match outcome {
            Wait::Skipped => (Some(self.get(id)?), 1),
            Wait::Ready { attempts } | Wait::Exhausted { attempts } => (last, attempts),
        };

        let not_ready = || ResourceError::NotReady {
            id: id.to_string(),
            attempts,
        };
        let Some(doc) = last else {
            return Err(not_ready());
        };
        match status::verdict(&doc) {
            Readiness::Ready => Ok(doc),
            Readiness::Failed { code, message } => Err(ResourceError::Faulty {
                id: id.to_string(),
                code,
                message,
            }),
            Readiness::Pending(_) => Err(not_ready()),
        }
    }

    fn check_id<'a>(&self, expected: ResourceType, id: &'a str) -> Result<&'a str> {
        if validate(Some(id), expected.pattern()) {
            return Ok(id);
        }
        tracing::info!(expected = %expected, id, "rejecting malformed id");
        Err(ResourceError::InvalidInput {
            expected,
            id: id.to_string(),
        })
    }

    fn id_of<'d>(&self, document: &'d Document) -> Result<&'d str> {
        resource_id(document).ok_or_else(|| {
            tracing::info!(expected = %self.kind.resource, "document has no resource id");
            ResourceError::InvalidInput {
                expected: self.kind.resource,
                id: String::new(),
            }
        })
    }

    fn dependency_ready(&self, dependency_id: &str) -> AnyResult<bool> {
        match self.probes.get(&self.kind.dependency) {
            Some(probe) => probe.is_ready(dependency_id),
            None => {
                let doc = self.transport.get_resource(dependency_id)?;
                Ok(status::is_finished(&doc))
            }
        }
    }

    /// Copy of `args` with the dependency id and input payload injected.
    fn build_request(
        &self,
        dependency_id: &str,
        input: Option<&Document>,
        args: Option<&Document>,
    ) -> Document {
        let mut body = args.cloned().unwrap_or_default();
        body.insert(
            self.kind.dependency_field.to_string(),
            Value::String(dependency_id.to_string()),
        );
        body.insert(
            self.kind.input_field.to_string(),
            Value::Object(input.cloned().unwrap_or_default()),
        );
        body
    }

    fn spinner(&self, dependency_id: &str, policy: &PollingPolicy) -> Option<ProgressBar> {
        if !self.progress || policy.interval.is_zero() || policy.max_attempts == 0 {
            return None;
        }
        let pb = ProgressBar::new(u64::from(policy.max_attempts));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} (check {pos}/{len}, {elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("waiting for {}", dependency_id));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

fn failed(op: &str, path: &str, err: anyhow::Error) -> ResourceError {
    tracing::error!(op, path, error = %format!("{err:#}"), "request failed");
    ResourceError::Transport(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use serde_json::json;

    const TS: &str = "timeseries/abc123def456abc123def456";
    const FC: &str = "forecast/0123456789abcdef01234567";

    struct Unreachable;

    impl Transport for Unreachable {
        fn create_resource(&self, _: &str, _: &Document) -> AnyResult<Document> {
            bail!("network disabled")
        }
        fn get_resource(&self, _: &str) -> AnyResult<Document> {
            bail!("network disabled")
        }
        fn update_resource(&self, _: &str, _: &Document) -> AnyResult<Document> {
            bail!("network disabled")
        }
        fn delete_resource(&self, _: &str) -> AnyResult<Document> {
            bail!("network disabled")
        }
        fn list_resources(&self, _: &str, _: &str) -> AnyResult<Document> {
            bail!("network disabled")
        }
    }

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    fn client() -> ResourceClient<Unreachable> {
        ResourceClient::with_transport(ResourceKind::FORECAST, Unreachable)
    }

    #[test]
    fn request_body_copies_args_and_injects_fields() {
        let args = doc(json!({"name": "weekly", "horizon": 7}));
        let input = doc(json!({"000001": {"horizon": 7}}));
        let body = client().build_request(TS, Some(&input), Some(&args));

        assert_eq!(
            Value::Object(body.clone()),
            json!({
                "name": "weekly",
                "horizon": 7,
                "timeseries": TS,
                "input_data": {"000001": {"horizon": 7}}
            })
        );
        let keys: Vec<_> = body.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "horizon", "timeseries", "input_data"]);
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn missing_input_becomes_empty_object() {
        let body = client().build_request(TS, None, None);
        assert_eq!(Value::Object(body), json!({"timeseries": TS, "input_data": {}}));
    }

    #[test]
    fn prediction_kind_uses_model_field() {
        let c = ResourceClient::with_transport(ResourceKind::PREDICTION, Unreachable);
        let model = "model/abc123def456abc123def456";
        let body = c.build_request(model, None, None);
        assert_eq!(Value::Object(body), json!({"model": model, "input_data": {}}));
    }

    #[test]
    fn is_instance_checks_the_resource_type() {
        let c = client();
        assert!(c.is_instance(&doc(json!({"resource": FC}))));
        assert!(!c.is_instance(&doc(json!({"resource": TS}))));
        assert!(!c.is_instance(&doc(json!({}))));
    }

    #[test]
    fn clients_can_cross_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ResourceClient<HttpTransport>>();
        assert_send_sync::<ResourceClient<Unreachable>>();
    }

    #[test]
    fn documents_of_another_type_are_never_ready() {
        let finished_series = doc(json!({"resource": TS, "status": {"code": 5}}));
        assert!(!client().is_ready_document(&finished_series));
        assert!(!client().is_ready_document(&doc(json!({"status": {"code": 5}}))));
    }

    #[test]
    fn transport_failures_surface_once() {
        let err = client().get(FC).unwrap_err();
        assert!(matches!(err, ResourceError::Transport(_)));
        assert!(err.to_string().contains("network disabled"));
    }

    #[test]
    fn document_without_id_is_invalid_input() {
        let err = client().delete_document(&doc(json!({"name": "x"}))).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::InvalidInput {
                expected: ResourceType::Forecast,
                ..
            }
        ));
    }

    #[test]
    fn default_probe_failure_reads_as_not_ready() {
        let c = client();
        assert!(c.dependency_ready(TS).is_err());
        assert!(!c.is_ready(FC));
    }

    #[test]
    fn registered_probe_is_used_for_dependency_type() {
        let c = client().with_probe(ResourceType::TimeSeries, |id: &str| id == TS);
        assert!(c.dependency_ready(TS).unwrap());
    }
}
