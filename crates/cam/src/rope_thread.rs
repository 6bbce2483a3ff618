//! "Rope Thread": threading parameters for a picked toolpath.
//! 「繩紋螺紋」：為選取的刀具路徑設定螺紋參數。

use cambench_commands::{CommandBehavior, CommandError, SessionContext};
use cambench_host::{InputChange, InputSpec, InputValue, SelectionRef};
use tracing::{debug, info};

pub const COMMAND: &str = "ropeThread";
pub const TOOLPATH: &str = "selectedToolpath";
pub const ROPE_DIAMETER: &str = "ropeDiameter";
pub const STEP_OVER: &str = "stepOver";

/// 10 mm, in host units (cm).
pub const DEFAULT_ROPE_DIAMETER: f64 = 1.0;
/// 0.3 mm, in host units (cm).
pub const DEFAULT_STEP_OVER: f64 = 0.03;

#[derive(Debug, Clone, PartialEq)]
pub enum RopeThreadInput {
    Toolpath(Option<SelectionRef>),
    RopeDiameter(f64),
    StepOver(f64),
}

impl TryFrom<InputChange> for RopeThreadInput {
    type Error = CommandError;

    fn try_from(change: InputChange) -> Result<Self, Self::Error> {
        match (change.id.as_str(), change.value) {
            (TOOLPATH, InputValue::Selection(selection)) => {
                Ok(RopeThreadInput::Toolpath(selection))
            }
            (ROPE_DIAMETER, InputValue::Distance(value)) => {
                Ok(RopeThreadInput::RopeDiameter(value))
            }
            (STEP_OVER, InputValue::Distance(value)) => Ok(RopeThreadInput::StepOver(value)),
            (TOOLPATH, _) => Err(CommandError::InvalidInput {
                id: TOOLPATH.to_string(),
                expected: "selection",
            }),
            (id @ (ROPE_DIAMETER | STEP_OVER), _) => Err(CommandError::InvalidInput {
                id: id.to_string(),
                expected: "distance",
            }),
            (id, _) => Err(CommandError::UnknownInput(id.to_string())),
        }
    }
}

/// Threading request for one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRequest {
    pub operation: SelectionRef,
    pub rope_diameter: f64,
    pub step_over: f64,
}

/// Rejects non-positive or NaN distances and a step over that is not
/// smaller than the rope diameter.
fn check_distances(diameter: f64, step_over: f64) -> Result<(), CommandError> {
    if diameter.is_nan() || diameter <= 0.0 {
        return Err(CommandError::Invalid(
            "Rope diameter must be positive".into(),
        ));
    }
    if step_over.is_nan() || step_over <= 0.0 || step_over >= diameter {
        return Err(CommandError::Invalid(
            "Step over must be positive and smaller than the rope diameter".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct RopeThreadCommand {
    requests: Vec<ThreadRequest>,
}

impl RopeThreadCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[ThreadRequest] {
        &self.requests
    }

    fn distance(ctx: &SessionContext<'_>, id: &str) -> Result<f64, CommandError> {
        match ctx.input(id) {
            Some(InputValue::Distance(value)) => Ok(*value),
            _ => Err(CommandError::InvalidInput {
                id: id.to_string(),
                expected: "distance",
            }),
        }
    }
}

impl CommandBehavior for RopeThreadCommand {
    type Input = RopeThreadInput;

    fn build_inputs(
        &mut self,
        _ctx: &mut SessionContext<'_>,
    ) -> Result<Vec<InputSpec>, CommandError> {
        Ok(vec![
            InputSpec::new(TOOLPATH, "Select Toolpath", InputValue::Selection(None)),
            InputSpec::new(
                ROPE_DIAMETER,
                "Diameter of the rope",
                InputValue::Distance(DEFAULT_ROPE_DIAMETER),
            ),
            InputSpec::new(
                STEP_OVER,
                "Step over",
                InputValue::Distance(DEFAULT_STEP_OVER),
            ),
        ])
    }

    fn input_changed(
        &mut self,
        input: RopeThreadInput,
        ctx: &mut SessionContext<'_>,
    ) -> Result<(), CommandError> {
        let RopeThreadInput::Toolpath(Some(selection)) = input else {
            return Ok(());
        };
        if ctx.host().is_selection_valid(&selection) {
            debug!(operation = %selection.label, "toolpath selected");
        } else {
            ctx.host()
                .notify_user(&format!("Operation: {} is out of date.", selection.label));
            ctx.set_input(TOOLPATH, InputValue::Selection(None));
        }
        Ok(())
    }

    fn validate(&self, ctx: &SessionContext<'_>) -> Result<(), CommandError> {
        ctx.selection(TOOLPATH)?;
        check_distances(
            Self::distance(ctx, ROPE_DIAMETER)?,
            Self::distance(ctx, STEP_OVER)?,
        )
    }

    fn execute(&mut self, ctx: &mut SessionContext<'_>) -> Result<(), CommandError> {
        self.validate(ctx)?;
        let request = ThreadRequest {
            operation: ctx.selection(TOOLPATH)?.clone(),
            rope_diameter: Self::distance(ctx, ROPE_DIAMETER)?,
            step_over: Self::distance(ctx, STEP_OVER)?,
        };
        info!(
            operation = %request.operation.label,
            diameter = request.rope_diameter,
            step_over = request.step_over,
            "rope thread requested"
        );
        self.requests.push(request);
        Ok(())
    }
}
