//! CAM utility commands built on the CamBench command framework.
//! 建構於 CamBench 命令框架之上的 CAM 工具命令。

pub mod defaults;
pub mod nc_program;
pub mod rope_thread;
pub mod set_defaults;
pub mod template;

use std::path::PathBuf;
use std::rc::Rc;

use cambench_commands::{
    CommandDescriptor, CommandLifecycle, ExtensionRegistry, LifecycleError, SettingsSpec,
};
use cambench_host::Host;
use cambench_resources::Placement;
use cambench_settings::{AddinConfig, CAM_UTILS_PANEL, POST_UTILS_PANEL};
use thiserror::Error;

pub use defaults::NcProgramDefaults;
pub use nc_program::{CreateNcProgramCommand, NcProgramRequest};
pub use rope_thread::{RopeThreadCommand, ThreadRequest};
pub use set_defaults::SetDefaultsCommand;
pub use template::TemplateCommand;

/// File name of the NC-program settings document inside the settings directory.
pub const DEFAULTS_FILE: &str = "defaults.json";

#[derive(Debug, Error)]
pub enum CamError {
    #[error("panel '{0}' is not configured")]
    UnknownPanel(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Resolves a configured panel into a resource-tree placement.
/// 將設定中的面板解析為資源樹位置。
pub fn placement_for(config: &AddinConfig, panel_key: &str) -> Result<Placement, CamError> {
    let panel = config
        .panel(panel_key)
        .ok_or_else(|| CamError::UnknownPanel(panel_key.to_string()))?;
    Ok(Placement {
        container_id: config.workspace_id.clone(),
        sub_id: config.tab.id.clone(),
        sub_name: config.tab.name.clone(),
        group_id: panel.id.clone(),
        group_name: panel.name.clone(),
        insert_after: panel.insert_after.clone(),
    })
}

/// Where the add-in keeps its icons and its settings document.
#[derive(Debug, Clone)]
pub struct CamPaths {
    pub resources: PathBuf,
    pub settings_dir: PathBuf,
}

impl CamPaths {
    pub fn new(resources: impl Into<PathBuf>, settings_dir: impl Into<PathBuf>) -> Self {
        Self {
            resources: resources.into(),
            settings_dir: settings_dir.into(),
        }
    }

    pub fn defaults_file(&self) -> PathBuf {
        self.settings_dir.join(DEFAULTS_FILE)
    }

    fn icons(&self, folder: &str) -> PathBuf {
        self.resources.join(folder)
    }
}

/// Descriptors of the CAM utility commands.
#[derive(Debug, Clone)]
pub struct CamDescriptors {
    pub rope_thread: CommandDescriptor,
    pub template: CommandDescriptor,
    pub nc_program: CommandDescriptor,
    pub set_defaults: CommandDescriptor,
}

impl CamDescriptors {
    pub fn build(config: &AddinConfig, paths: &CamPaths) -> Result<Self, CamError> {
        let cam_panel = placement_for(config, CAM_UTILS_PANEL)?;
        let post_panel = placement_for(config, POST_UTILS_PANEL)?;
        let nc_settings = SettingsSpec::new(paths.defaults_file(), NcProgramDefaults::compiled());

        Ok(Self {
            rope_thread: CommandDescriptor::new(
                config.command_id(rope_thread::COMMAND),
                "Rope Thread",
                cam_panel.clone(),
            )
            .with_description("Creates threading operation based of rope thread parameters")
            .promoted(true)
            .with_resources(paths.icons(rope_thread::COMMAND))
            .with_tooltip_image(paths.icons(rope_thread::COMMAND).join("toolTip.png")),
            template: CommandDescriptor::new(
                config.command_id(template::COMMAND),
                "Template Command",
                cam_panel,
            )
            .promoted(true)
            .with_resources(paths.icons(template::COMMAND)),
            nc_program: CommandDescriptor::new(
                config.command_id(nc_program::COMMAND),
                "NC Program Defaults",
                post_panel.clone(),
            )
            .with_description("Creates an NC Program with User defaults")
            .promoted(true)
            .with_resources(paths.icons("create"))
            .with_settings(nc_settings.clone()),
            set_defaults: CommandDescriptor::new(
                config.command_id(set_defaults::COMMAND),
                "Set NC Program Defaults",
                post_panel,
            )
            .with_description("Sets the user defaults for user NC Programs")
            .promoted(true)
            .with_resources(paths.icons("setDefaults"))
            .with_settings(nc_settings),
        })
    }

    pub fn ids(&self) -> [&str; 4] {
        [
            &self.rope_thread.id,
            &self.template.id,
            &self.nc_program.id,
            &self.set_defaults.id,
        ]
    }
}

/// Registers every CAM utility command with `registry`.
/// 將所有 CAM 工具命令註冊至登錄表。
pub fn register_all(
    registry: &mut ExtensionRegistry,
    host: Rc<dyn Host>,
    config: &AddinConfig,
    paths: &CamPaths,
) -> Result<(), CamError> {
    let descriptors = CamDescriptors::build(config, paths)?;
    registry.register(CommandLifecycle::new(
        descriptors.rope_thread,
        RopeThreadCommand::new(),
        Rc::clone(&host),
    ))?;
    registry.register(CommandLifecycle::new(
        descriptors.template,
        TemplateCommand::new(),
        Rc::clone(&host),
    ))?;
    registry.register(CommandLifecycle::new(
        descriptors.nc_program,
        CreateNcProgramCommand::new(),
        Rc::clone(&host),
    ))?;
    registry.register(CommandLifecycle::new(
        descriptors.set_defaults,
        SetDefaultsCommand::new(),
        host,
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_follows_addin_config() {
        let config = AddinConfig::default();
        let placement = placement_for(&config, POST_UTILS_PANEL).unwrap();
        assert_eq!(placement.container_id, "CAMEnvironment");
        assert_eq!(placement.sub_id, "CAM_UTILITIES_cam_tab");
        assert_eq!(placement.group_id, "CamUtilities_postUtils_panel");
        assert_eq!(placement.group_name, "POST UTILITIES");
        assert!(matches!(
            placement_for(&config, "missing"),
            Err(CamError::UnknownPanel(key)) if key == "missing"
        ));
    }

    #[test]
    fn descriptors_use_company_prefixed_ids() {
        let config = AddinConfig::default();
        let paths = CamPaths::new("/addin/resources", "/addin/settings");
        let descriptors = CamDescriptors::build(&config, &paths).unwrap();
        assert_eq!(
            descriptors.ids(),
            [
                "DSI_CamUtilities_ropeThread",
                "DSI_CamUtilities_Template_Command",
                "DSI_CamUtilities_ncProgramsDefault",
                "DSI_CamUtilities_setNcProgramDefaults",
            ]
        );
        assert_eq!(
            descriptors.nc_program.settings.as_ref().unwrap().path,
            PathBuf::from("/addin/settings/defaults.json")
        );
    }
}
