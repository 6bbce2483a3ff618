use std::path::PathBuf;
use std::rc::Rc;

use cambench_cam::defaults::{self, NcProgramDefaults};
use cambench_cam::rope_thread::{ROPE_DIAMETER, STEP_OVER, TOOLPATH};
use cambench_cam::set_defaults::SELECT_FOLDER;
use cambench_cam::{
    register_all, CamDescriptors, CamPaths, CreateNcProgramCommand, RopeThreadCommand,
};
use cambench_commands::{CommandLifecycle, ExtensionRegistry, LifecycleState};
use cambench_host::{
    InputChange, InputValue, NodePath, SelectionRef, SessionToken, SimulatedHost, TerminationReason,
    WorkspaceHost,
};
use cambench_settings::{AddinConfig, SettingsStore};
use tempfile::tempdir;

fn cam_host() -> Rc<SimulatedHost> {
    let host = Rc::new(SimulatedHost::new());
    host.add_container("CAMEnvironment", "Manufacture");
    host
}

fn shown(host: &SimulatedHost, session: SessionToken, id: &str) -> InputValue {
    host.session_inputs(session)
        .unwrap()
        .into_iter()
        .find(|spec| spec.id == id)
        .map(|spec| spec.value)
        .unwrap()
}

fn text(id: &str, value: &str) -> InputChange {
    InputChange::new(id, InputValue::Text(value.into()))
}

#[test]
fn extension_installs_all_commands_under_the_cam_tab() {
    let dir = tempdir().unwrap();
    let host = cam_host();
    let config = AddinConfig::default();
    let paths = CamPaths::new(dir.path().join("resources"), dir.path());
    let mut registry = ExtensionRegistry::new();
    register_all(&mut registry, host.clone(), &config, &paths).unwrap();

    let started = registry.start();
    assert!(started.is_clean());
    assert_eq!(started.installed.len(), 4);

    let tab = NodePath::root("CAMEnvironment").child("CAM_UTILITIES_cam_tab");
    let panels: Vec<_> = host
        .children(&tab)
        .unwrap()
        .into_iter()
        .map(|node| node.display_name)
        .collect();
    assert_eq!(panels, vec!["CAM UTILITIES", "POST UTILITIES"]);
    let rope = host.find_definition("DSI_CamUtilities_ropeThread").unwrap();
    assert_eq!(
        rope.tooltip_image,
        Some(dir.path().join("resources/ropeThread/toolTip.png"))
    );

    let stopped = registry.stop();
    assert_eq!(stopped.uninstalled.len(), 4);
    assert!(host
        .children(&NodePath::root("CAMEnvironment"))
        .unwrap()
        .is_empty());
}

#[test]
fn set_defaults_session_edits_and_persists_settings() {
    let dir = tempdir().unwrap();
    let host = cam_host();
    let config = AddinConfig::default();
    let paths = CamPaths::new(dir.path().join("resources"), dir.path());
    let mut registry = ExtensionRegistry::new();
    register_all(&mut registry, host.clone(), &config, &paths).unwrap();
    registry.start();

    let command = "DSI_CamUtilities_setNcProgramDefaults";
    let session = host.start_session(command).unwrap();
    assert_eq!(host.session_inputs(session).unwrap().len(), 8);
    assert_eq!(
        shown(&host, session, defaults::DISPLAY_NAME),
        InputValue::Text("NC Program".into())
    );

    let chosen = dir.path().join("jobs");
    host.set_folder_choice(Some(chosen.clone()));
    host.change_input(
        session,
        InputChange::new(SELECT_FOLDER, InputValue::Toggle(true)),
    )
    .unwrap();
    assert_eq!(
        shown(&host, session, defaults::FILE_PATH),
        InputValue::Text(chosen.display().to_string())
    );
    assert_eq!(
        shown(&host, session, SELECT_FOLDER),
        InputValue::Toggle(false)
    );

    host.change_input(session, text(defaults::DISPLAY_NAME, "Op 10"))
        .unwrap();
    host.change_input(
        session,
        InputChange::new(defaults::CREATE_FOLDER, InputValue::Toggle(true)),
    )
    .unwrap();
    host.change_input(session, text(defaults::OUTPUT_FOLDER, ""))
        .unwrap();
    assert!(!host.validate(session).unwrap());
    host.change_input(session, text(defaults::OUTPUT_FOLDER, "Bracket"))
        .unwrap();
    assert!(host.validate(session).unwrap());

    host.execute(session).unwrap();
    host.destroy(session, TerminationReason::Completed).unwrap();

    let store = SettingsStore::load(paths.defaults_file(), NcProgramDefaults::compiled()).unwrap();
    let saved = NcProgramDefaults::from_store(&store).unwrap();
    assert_eq!(saved.display_name, "Op 10");
    assert!(saved.create_folder);
    assert_eq!(saved.file_path, Some(chosen.clone()));
    assert_eq!(
        saved.output_folder_from(&PathBuf::from("/unused")),
        chosen.join("Bracket")
    );

    // The next session is seeded from what was just saved.
    let next = host.start_session(command).unwrap();
    assert_eq!(
        shown(&host, next, defaults::DISPLAY_NAME),
        InputValue::Text("Op 10".into())
    );
    registry.stop();
}

#[test]
fn nc_program_uses_desktop_without_a_stored_path() {
    let dir = tempdir().unwrap();
    let host = cam_host();
    let paths = CamPaths::new(dir.path().join("resources"), dir.path());
    let config = AddinConfig::default();
    let descriptors = CamDescriptors::build(&config, &paths).unwrap();
    let lifecycle = CommandLifecycle::new(
        descriptors.nc_program,
        CreateNcProgramCommand::new().with_desktop("/home/op/Desktop"),
        host.clone(),
    );
    lifecycle.install().unwrap();

    let session = host
        .start_session("DSI_CamUtilities_ncProgramsDefault")
        .unwrap();
    assert!(host.session_inputs(session).unwrap().is_empty());
    host.execute(session).unwrap();

    lifecycle.inspect(|command| {
        let request = &command.requests()[0];
        assert_eq!(request.program_name, "1001");
        assert_eq!(request.output_folder, PathBuf::from("/home/op/Desktop"));
    });
}

#[test]
fn rope_thread_rejects_out_of_date_toolpaths() {
    let dir = tempdir().unwrap();
    let host = cam_host();
    let paths = CamPaths::new(dir.path().join("resources"), dir.path());
    let config = AddinConfig::default();
    let descriptors = CamDescriptors::build(&config, &paths).unwrap();
    let lifecycle = CommandLifecycle::new(
        descriptors.rope_thread,
        RopeThreadCommand::new(),
        host.clone(),
    );
    lifecycle.install().unwrap();
    let session = host.start_session("DSI_CamUtilities_ropeThread").unwrap();
    assert_eq!(
        shown(&host, session, ROPE_DIAMETER),
        InputValue::Distance(1.0)
    );

    // Nothing picked yet.
    assert!(!host.validate(session).unwrap());

    host.mark_stale("op-old");
    host.change_input(
        session,
        InputChange::new(
            TOOLPATH,
            InputValue::Selection(Some(SelectionRef::new("op-old", "Adaptive1"))),
        ),
    )
    .unwrap();
    assert_eq!(
        host.notices(),
        vec!["Operation: Adaptive1 is out of date.".to_string()]
    );
    assert_eq!(shown(&host, session, TOOLPATH), InputValue::Selection(None));
    assert!(!host.validate(session).unwrap());

    host.change_input(
        session,
        InputChange::new(
            TOOLPATH,
            InputValue::Selection(Some(SelectionRef::new("op-1", "Thread1"))),
        ),
    )
    .unwrap();
    assert!(host.validate(session).unwrap());

    host.change_input(
        session,
        InputChange::new(STEP_OVER, InputValue::Distance(2.0)),
    )
    .unwrap();
    assert!(!host.validate(session).unwrap());
    host.change_input(
        session,
        InputChange::new(STEP_OVER, InputValue::Distance(0.05)),
    )
    .unwrap();
    host.execute(session).unwrap();

    lifecycle.inspect(|command| {
        assert_eq!(command.requests().len(), 1);
        assert_eq!(command.requests()[0].operation.label, "Thread1");
        assert_eq!(command.requests()[0].step_over, 0.05);
    });
    host.destroy(session, TerminationReason::Completed).unwrap();
    assert_eq!(lifecycle.state(), LifecycleState::Installed);
}
