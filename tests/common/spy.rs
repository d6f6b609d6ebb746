//! Recording collaborators.
//!
//! `spy` (input) and `outputSpy` (output) actions record their label on
//! every invocation and produce one attribute named after it. A second
//! parameter `BREAK` stops the profile after the action.

use identity_translation::action::{
    ActionDefinition, ActionDescriptor, ActionFactory, ActionParameter, ActionRegistry,
    ExecutionFlow, InputTranslationAction, InvocationContext, MappingOutcome,
    OutputTranslationAction, ParameterKind, TranslationAction,
};
use identity_translation::apply::{MappingReconciler, ReconcileOutcome, ReconcileRequest};
use identity_translation::error::{ActionError, RegistryError};
use identity_translation::model::{Attribute, RemotelyAuthenticatedInput, TranslationInput};
use identity_translation::profile::{ProfileDirection, ProfileMode};
use identity_translation::result::{
    AttributeEffectMode, DynamicAttribute, MappedAttribute, MappingResult, TranslationResult,
};
use std::sync::{Arc, Mutex};

/// Labels of the spy invocations, in call order.
#[derive(Debug, Clone, Default)]
pub struct SpyLog(Arc<Mutex<Vec<String>>>);

impl SpyLog {
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn record(&self, label: &str) {
        self.0.lock().unwrap().push(label.to_string());
    }
}

static SPY_PARAMETERS: [ActionParameter; 2] = [
    ActionParameter::required("label", ParameterKind::Text),
    ActionParameter::optional("flow", ParameterKind::Enum(&["CONTINUE", "BREAK"])),
];

#[derive(Debug)]
struct SpyFactory {
    direction: ProfileDirection,
    log: SpyLog,
}

#[derive(Debug)]
struct SpyAction {
    definition: ActionDefinition,
    label: String,
    flow: ExecutionFlow,
    log: SpyLog,
}

impl ActionFactory for SpyFactory {
    fn direction(&self) -> ProfileDirection {
        self.direction
    }

    fn parameters(&self) -> &[ActionParameter] {
        &SPY_PARAMETERS
    }

    fn create(&self, definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
        self.validate(&definition)?;
        let action = Arc::new(SpyAction {
            label: definition.parameter(0).unwrap_or_default().to_string(),
            flow: match definition.parameter(1) {
                Some("BREAK") => ExecutionFlow::Break,
                _ => ExecutionFlow::Continue,
            },
            log: self.log.clone(),
            definition,
        });
        Ok(match self.direction {
            ProfileDirection::Input => TranslationAction::Input(action),
            ProfileDirection::Output => TranslationAction::Output(action),
        })
    }
}

impl ActionDescriptor for SpyAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl InputTranslationAction for SpyAction {
    fn invoke(
        &self,
        _input: &RemotelyAuthenticatedInput,
        _invocation: &InvocationContext<'_>,
    ) -> Result<MappingOutcome, ActionError> {
        self.log.record(&self.label);
        let mut result = MappingResult::new();
        result.add_attribute(MappedAttribute {
            mode: AttributeEffectMode::CreateOrUpdate,
            attribute: Attribute::new(&self.label, "/", [self.label.as_str()]),
        });
        Ok(MappingOutcome {
            result,
            flow: self.flow,
        })
    }
}

impl OutputTranslationAction for SpyAction {
    fn invoke(
        &self,
        _input: &TranslationInput,
        _invocation: &InvocationContext<'_>,
        result: &mut TranslationResult,
    ) -> Result<ExecutionFlow, ActionError> {
        self.log.record(&self.label);
        result.add_attribute(DynamicAttribute::new(Attribute::new(
            &self.label,
            "/",
            [self.label.as_str()],
        )));
        Ok(self.flow)
    }
}

/// Built-in registry plus `spy` and `outputSpy`, sharing one log.
pub fn spy_registry() -> (ActionRegistry, SpyLog) {
    let log = SpyLog::default();
    let mut registry = ActionRegistry::with_builtin_actions();
    registry
        .register_factory(
            "spy",
            Arc::new(SpyFactory {
                direction: ProfileDirection::Input,
                log: log.clone(),
            }),
        )
        .unwrap();
    registry
        .register_factory(
            "outputSpy",
            Arc::new(SpyFactory {
                direction: ProfileDirection::Output,
                log: log.clone(),
            }),
        )
        .unwrap();
    (registry, log)
}

/// What a [`RecordingReconciler`] received.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMapping {
    pub result: MappingResult,
    pub idp: String,
    pub profile: String,
    pub mode: ProfileMode,
}

/// Reconciler that stores every request and matches nothing.
#[derive(Debug, Default)]
pub struct RecordingReconciler {
    received: Mutex<Vec<ReceivedMapping>>,
}

impl RecordingReconciler {
    pub fn received(&self) -> Vec<ReceivedMapping> {
        self.received.lock().unwrap().clone()
    }
}

impl MappingReconciler for RecordingReconciler {
    type Error = std::convert::Infallible;

    async fn reconcile(&self, request: ReconcileRequest<'_>) -> Result<ReconcileOutcome, Self::Error> {
        self.received.lock().unwrap().push(ReceivedMapping {
            result: request.result.clone(),
            idp: request.idp.to_string(),
            profile: request.profile.to_string(),
            mode: request.mode,
        });
        Ok(ReconcileOutcome::UnknownEntity)
    }
}
