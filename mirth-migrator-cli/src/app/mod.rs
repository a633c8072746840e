//! Application controller
//!
//! Owns the session guard, the selection model and the migration workflow
//! for the lifetime of a console session. Work is processed from a FIFO list:
//! server calls of one batch are issued concurrently, their responses are
//! applied one after another in submission order. Responses are routed by
//! their [`Reply`] tag, which survives a login interruption.

use std::collections::{HashMap, VecDeque};

use anyhow::{Context, Result};
use futures::future::join_all;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::api::models::{
    CompareRequest, CompareTarget, ComparisonResult, ComponentDetails, ComponentDetailsRequest,
    ComponentKind, ComponentLocator, ComponentMetaData, ComponentMetaDataRequest, ConflictDetail,
    ConflictList, DetailAttribute, EnvironmentInfo, MetaDataRow, MigrationResult,
    ServerConfiguration, SystemInfo, VersionInfo, metadata_rows, sort_systems,
};
use crate::api::{ApiCall, CallOutcome, Endpoint, LoginPrompt, ServerFailure, SessionGuard, Transport};
use crate::diff::{ContextScope, DiffView, DisplayMode};
use crate::migration::{
    Command, Component, ComponentType, MigrationRequest, MigrationWorkflow, Msg, Resolution, Row,
    SelectMode, SelectionModel, TableSide, WorkflowState, build_selection_set,
};

/// Where the response of a call goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Environments,
    Systems,
    Version,
    Table { side: TableSide, system: String },
    Details { side: TableSide, system: String },
    ReferencedTemplates,
    ConflictList,
    ConflictDetail,
    MigrationResult,
    Comparison {
        name: String,
        component_type: ComponentType,
        source_system: String,
        destination_system: String,
    },
    Configuration,
    ConfigurationSaved,
}

impl Reply {
    /// Responses consumed by the migration workflow
    fn is_workflow(&self) -> bool {
        matches!(
            self,
            Self::ReferencedTemplates | Self::ConflictList | Self::ConflictDetail | Self::MigrationResult
        )
    }
}

/// Something the operator has to be told about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Error { status: u16, message: String },
    Unavailable { message: String },
    /// The server configuration changed, client state has to be reloaded
    ReloadRequired,
    /// The server has no configuration yet, it has been requested for editing
    ConfigurationRequired,
    ConfigurationUnchanged,
    ConfigurationSaved,
    NothingSelected,
}

/// Settings of a controller taken from the local configuration
#[derive(Debug, Clone, Default)]
pub struct ControllerSettings {
    pub migrate_referenced_templates: bool,
    pub display_mode: DisplayMode,
    pub scope: ContextScope,
}

/// Details of a component shown below the tables
#[derive(Debug, Clone)]
pub struct ShownDetails {
    pub system: String,
    pub attributes: Vec<DetailAttribute>,
    pub content: Option<String>,
}

/// Result of comparing a component between the two systems
#[derive(Debug, Clone)]
pub struct Comparison {
    pub name: String,
    pub component_type: ComponentType,
    pub view: DiffView,
    pub metadata: Vec<MetaDataRow>,
}

enum Work {
    Calls(Vec<ApiCall<Reply>>),
    Workflow(Msg),
}

pub struct Controller<T: Transport> {
    guard: SessionGuard<T, Reply>,
    settings: ControllerSettings,
    kind: ComponentKind,
    chosen: HashMap<TableSide, String>,
    pub selection: SelectionModel,
    pub workflow: MigrationWorkflow,
    pub environments: Vec<EnvironmentInfo>,
    pub systems: Vec<SystemInfo>,
    pub migrator_version: Option<String>,
    pub configuration: Option<ServerConfiguration>,
    pub details: Option<ShownDetails>,
    pub comparison: Option<Comparison>,
    work: VecDeque<Work>,
    notices: Vec<Notice>,
    login_prompt: Option<LoginPrompt>,
}

impl<T: Transport> Controller<T> {
    pub fn new(transport: T, settings: ControllerSettings) -> Self {
        Self {
            guard: SessionGuard::new(transport),
            settings,
            kind: ComponentKind::Channels,
            chosen: HashMap::new(),
            selection: SelectionModel::new(),
            workflow: MigrationWorkflow::new(),
            environments: Vec::new(),
            systems: Vec::new(),
            migrator_version: None,
            configuration: None,
            details: None,
            comparison: None,
            work: VecDeque::new(),
            notices: Vec::new(),
            login_prompt: None,
        }
    }

    pub fn guard(&self) -> &SessionGuard<T, Reply> {
        &self.guard
    }

    pub fn settings_mut(&mut self) -> &mut ControllerSettings {
        &mut self.settings
    }

    pub fn set_credentials(&self, username: &str, password: &str) {
        self.guard.set_credentials(username, password);
    }

    /// Notices collected since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Pending login request, if calls are waiting for credentials
    pub fn take_login_prompt(&mut self) -> Option<LoginPrompt> {
        self.login_prompt.take()
    }

    fn enqueue(&mut self, endpoint: Endpoint, payload: Value, reply: Reply) {
        self.work
            .push_back(Work::Calls(vec![ApiCall::new(endpoint, payload, reply)]));
    }

    fn enqueue_batch(&mut self, calls: Vec<ApiCall<Reply>>) {
        if !calls.is_empty() {
            self.work.push_back(Work::Calls(calls));
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        self.work.push_back(Work::Workflow(msg));
    }

    /// Process queued work until nothing is left
    pub async fn run(&mut self) {
        while let Some(work) = self.work.pop_front() {
            match work {
                Work::Workflow(msg) => {
                    let command = self.workflow.update(msg);
                    self.execute(command);
                }
                Work::Calls(calls) => {
                    let outcomes = join_all(calls.into_iter().map(|call| self.guard.call(call))).await;
                    for outcome in outcomes {
                        self.apply(outcome);
                    }
                }
            }
        }
    }

    /// Log in and replay every call that was waiting for it
    pub async fn login(&mut self, username: &str, password: &str) {
        self.login_prompt = None;
        let outcomes = self.guard.login(username, password).await;
        for outcome in outcomes {
            self.apply(outcome);
        }
        self.run().await;
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::None => {}
            Command::NothingSelected => self.notices.push(Notice::NothingSelected),
            Command::FetchReferencedTemplates(payload) => self.enqueue(
                Endpoint::GetReferencedCodeTemplates,
                json!(payload),
                Reply::ReferencedTemplates,
            ),
            Command::CheckConflicts(payload) => self.enqueue(
                Endpoint::GetConflictingComponents,
                json!(payload),
                Reply::ConflictList,
            ),
            Command::LoadConflict(request) => {
                self.enqueue(Endpoint::GetConflicts, json!(request), Reply::ConflictDetail)
            }
            Command::Migrate(payload) => {
                self.enqueue(Endpoint::MigrateComponents, json!(payload), Reply::MigrationResult)
            }
            Command::RefreshTables => self.refresh_tables(true),
        }
    }

    fn apply(&mut self, outcome: CallOutcome<Reply>) {
        match outcome {
            CallOutcome::Completed { reply, status, body } => {
                let workflow = reply.is_workflow();
                if let Err(err) = self.handle_reply(reply, body) {
                    warn!("Failed to handle response: {:#}", err);
                    self.notices.push(Notice::Error {
                        status,
                        message: format!("{:#}", err),
                    });
                    if workflow {
                        self.dispatch(Msg::CallFailed);
                    }
                }
            }
            CallOutcome::Deferred(prompt) => {
                // Keep the most specific reason
                let keep = matches!(&self.login_prompt, Some(LoginPrompt { reason: Some(_) }))
                    && prompt.reason.is_none();
                if !keep {
                    self.login_prompt = Some(prompt);
                }
            }
            CallOutcome::Failed { reply, failure } => self.fail(reply, failure),
        }
    }

    fn fail(&mut self, reply: Reply, failure: ServerFailure) {
        match failure {
            ServerFailure::ReloadRequired => {
                if !self.notices.contains(&Notice::ReloadRequired) {
                    self.notices.push(Notice::ReloadRequired);
                }
            }
            ServerFailure::ConfigurationMissing => {
                self.notices.push(Notice::ConfigurationRequired);
                if reply != Reply::Configuration {
                    self.enqueue(Endpoint::GetConfiguration, json!({}), Reply::Configuration);
                }
            }
            ServerFailure::Unavailable { message } => self.notices.push(Notice::Unavailable { message }),
            other => self.notices.push(Notice::Error {
                status: other.status(),
                message: other.message(),
            }),
        }

        if reply.is_workflow() {
            self.dispatch(Msg::CallFailed);
        }
    }

    fn handle_reply(&mut self, reply: Reply, body: Value) -> Result<()> {
        match reply {
            Reply::Environments => {
                self.environments = parse(body, "environments")?;
            }
            Reply::Systems => {
                let mut systems: Vec<SystemInfo> = parse(body, "systems")?;
                sort_systems(&mut systems);
                info!("{} system(s) available", systems.len());
                self.systems = systems;
            }
            Reply::Version => {
                let version: VersionInfo = parse(body, "version")?;
                self.migrator_version = Some(version.version);
            }
            Reply::Table { side, system } => {
                if self.chosen.get(&side) != Some(&system) {
                    debug!("Dropping stale {} table of {}", side.label(), system);
                    return Ok(());
                }
                let metadata: ComponentMetaData = parse(body, "component list")?;
                let rows: Vec<Row> = metadata.item.into_iter().map(Row::from).collect();
                debug!("Loaded {} row(s) into the {} table", rows.len(), side.label());
                self.selection.load(side, system, metadata.mirth_version, rows);
            }
            Reply::Details { side, system } => {
                if self.chosen.get(&side) != Some(&system) {
                    debug!("Dropping stale details from {}", system);
                    return Ok(());
                }
                let details: ComponentDetails = parse(body, "component details")?;
                self.details = Some(ShownDetails {
                    system,
                    attributes: details.attributes(),
                    content: details.content,
                });
            }
            Reply::ReferencedTemplates => {
                let templates: Option<Vec<Component>> = parse(body, "referenced code templates")?;
                self.dispatch(Msg::ReferencedTemplatesLoaded(templates.unwrap_or_default()));
            }
            Reply::ConflictList => {
                let conflicts: Option<ConflictList> = parse(body, "conflict list")?;
                self.dispatch(Msg::ConflictsDetected(
                    conflicts.map(|list| list.component).unwrap_or_default(),
                ));
            }
            Reply::ConflictDetail => {
                let detail: ConflictDetail = parse(body, "conflict")?;
                self.dispatch(Msg::ConflictLoaded(detail));
            }
            Reply::MigrationResult => {
                let result: MigrationResult = parse(body, "migration result")?;
                self.dispatch(Msg::MigrationFinished(result));
            }
            Reply::Comparison {
                name,
                component_type,
                source_system,
                destination_system,
            } => {
                let result: ComparisonResult = parse(body, "comparison")?;
                let view = self.diff_view(result.source_content, result.destination_content)
                    .with_titles(source_system, destination_system);
                self.comparison = Some(Comparison {
                    name,
                    component_type,
                    view,
                    metadata: metadata_rows(result.meta_data.as_ref()),
                });
            }
            Reply::Configuration => {
                let configuration: ServerConfiguration = parse(body, "configuration")?;
                self.guard.set_configuration_loaded(true);
                self.configuration = Some(configuration);
            }
            Reply::ConfigurationSaved => {
                self.notices.push(Notice::ConfigurationSaved);
                self.enqueue(Endpoint::GetSystems, json!({}), Reply::Systems);
            }
        }
        Ok(())
    }

    /// Diff view with the configured display mode and scope
    pub fn diff_view(&self, source: Option<String>, destination: Option<String>) -> DiffView {
        DiffView::new(source, destination)
            .with_mode(self.settings.display_mode)
            .with_scope(self.settings.scope)
    }

    /// Load environments, systems and the migrator version
    pub fn load_systems(&mut self) {
        self.enqueue_batch(vec![
            ApiCall::new(Endpoint::GetEnvironments, json!({}), Reply::Environments),
            ApiCall::new(Endpoint::GetSystems, json!({}), Reply::Systems),
            ApiCall::new(Endpoint::GetVersion, json!({}), Reply::Version),
        ]);
    }

    pub fn find_system(&self, name: &str) -> Option<&SystemInfo> {
        self.systems.iter().find(|system| system.name == name)
    }

    /// Show the components of a system in one of the tables
    pub fn select_system(&mut self, side: TableSide, system: &str, refresh: bool) {
        self.chosen.insert(side, system.to_string());
        self.selection.unload(side);
        self.enqueue(
            Endpoint::GetComponentMetaData,
            self.table_payload(system, refresh),
            Reply::Table {
                side,
                system: system.to_string(),
            },
        );
    }

    /// Switch between channels and code templates
    pub fn set_component_kind(&mut self, kind: ComponentKind) {
        if self.kind != kind {
            self.kind = kind;
            self.refresh_tables(false);
        }
    }

    fn table_payload(&self, system: &str, refresh: bool) -> Value {
        json!(ComponentMetaDataRequest {
            component_type: self.kind,
            system: system.to_string(),
            refresh,
        })
    }

    /// Reload both tables, optionally asking the server to refresh its cache
    pub fn refresh_tables(&mut self, refresh: bool) {
        let mut calls = Vec::new();
        for side in [TableSide::Source, TableSide::Destination] {
            if let Some(system) = self.chosen.get(&side) {
                calls.push(ApiCall::new(
                    Endpoint::GetComponentMetaData,
                    self.table_payload(system, refresh),
                    Reply::Table {
                        side,
                        system: system.clone(),
                    },
                ));
            }
        }
        self.details = None;
        self.enqueue_batch(calls);
    }

    /// Click on a row; a plain click also loads the details of the component
    pub fn click(&mut self, side: TableSide, index: usize, mode: SelectMode) {
        self.selection.toggle(side, index, mode);
        if mode != SelectMode::Single || !self.selection.table(side).is_highlighted(index) {
            return;
        }

        let table = self.selection.table(side);
        let (Some(system), Some(row)) = (table.system.clone(), table.rows.get(index)) else {
            return;
        };
        let request = ComponentDetailsRequest {
            system: system.clone(),
            component: ComponentLocator {
                component_type: row.component_type,
                id: row.row_id.clone(),
            },
        };
        self.enqueue(
            Endpoint::GetComponentDetails,
            json!(request),
            Reply::Details { side, system },
        );
    }

    /// Start migrating the highlighted components to the other table's system
    pub fn start_migration(&mut self) -> Result<()> {
        let source = self
            .selection
            .migration_source()
            .context("Select components in exactly one of two loaded tables")?;
        let source_table = self.selection.table(source);
        let destination_table = self.selection.table(source.opposite());

        let request = MigrationRequest {
            source_system: source_table.system.clone().unwrap_or_default(),
            destination_system: destination_table.system.clone().unwrap_or_default(),
            selection: build_selection_set(&source_table.rows, &source_table.highlighted()),
            include_referenced_templates: self.settings.migrate_referenced_templates,
        };
        self.dispatch(Msg::Start(request));
        Ok(())
    }

    pub fn resolve_conflict(&mut self, resolution: Resolution, apply_to_all: bool) {
        self.dispatch(Msg::Resolve {
            resolution,
            apply_to_all,
        });
    }

    pub fn cancel_migration(&mut self) {
        self.dispatch(Msg::Cancel);
    }

    /// Close the migration report
    pub fn acknowledge_report(&mut self) {
        self.dispatch(Msg::Acknowledge);
    }

    /// Compare the highlighted leaf component with its partner on the other system
    ///
    /// Without an explicit target the corresponding row is the partner.
    pub fn compare(&mut self, target_id: Option<String>) -> Result<()> {
        let (side, row, target) = match target_id {
            Some(target) => {
                let side = self
                    .selection
                    .highlighted_side()
                    .context("Nothing selected to compare")?;
                let rows = self.selection.table(side).highlighted_rows();
                let [row] = rows.as_slice() else {
                    anyhow::bail!("Select exactly one component to compare");
                };
                if !row.is_leaf() {
                    anyhow::bail!("Only channels and code templates can be compared");
                }
                (side, (*row).clone(), Some(target))
            }
            None => {
                let (side, row, partner) = self
                    .selection
                    .compare_pair()
                    .context("No corresponding component to compare with")?;
                let target = (partner.component_id() != row.component_id())
                    .then(|| partner.component_id().to_string());
                (side, row.clone(), target)
            }
        };

        let source_system = self.selection.table(side).system.clone().unwrap_or_default();
        let destination_system = self
            .selection
            .table(side.opposite())
            .system
            .clone()
            .context("No system loaded on the other side")?;

        let request = CompareRequest {
            source_system: source_system.clone(),
            destination_system: destination_system.clone(),
            component: CompareTarget {
                id: row.component_id().to_string(),
                component_type: row.component_type,
                target_id: target,
            },
        };
        self.enqueue(
            Endpoint::CompareComponent,
            json!(request),
            Reply::Comparison {
                name: row.label.clone(),
                component_type: row.component_type,
                source_system,
                destination_system,
            },
        );
        Ok(())
    }

    pub fn pull_configuration(&mut self) {
        self.enqueue(Endpoint::GetConfiguration, json!({}), Reply::Configuration);
    }

    /// Store a configuration on the server unless it equals the loaded one
    pub fn push_configuration(&mut self, configuration: ServerConfiguration) {
        if self.configuration.as_ref() == Some(&configuration) {
            info!("Configuration unchanged, not saving");
            self.notices.push(Notice::ConfigurationUnchanged);
            return;
        }
        self.enqueue(
            Endpoint::SetConfiguration,
            json!(configuration),
            Reply::ConfigurationSaved,
        );
        self.configuration = Some(configuration);
    }

    /// Discard client state after the server configuration changed and reload
    pub fn acknowledge_reload(&mut self) {
        info!("Reloading after server configuration change");
        self.guard.discard_pending();
        self.guard.set_configuration_loaded(false);
        self.work.clear();
        self.chosen.clear();
        self.selection = SelectionModel::new();
        self.workflow = MigrationWorkflow::new();
        self.details = None;
        self.comparison = None;
        self.configuration = None;
        self.login_prompt = None;
        self.load_systems();
    }

    pub fn workflow_state(&self) -> &WorkflowState {
        self.workflow.state()
    }
}

fn parse<D: DeserializeOwned>(body: Value, what: &str) -> Result<D> {
    serde_json::from_value(body).with_context(|| format!("Unexpected {} response", what))
}
