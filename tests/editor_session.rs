use anyhow::Result;
use camino::Utf8PathBuf;

use epiflow::canvas::{CanvasEvent, ElementRef, RecordingCanvas};
use epiflow::editor::{EditRequest, EditorState, ModelCommand};
use epiflow::model::{Compartment, FileKind, Id, Model, ModelDoc};
use epiflow::settings::Settings;

fn editor() -> EditorState<RecordingCanvas> {
    EditorState::new(RecordingCanvas::new(), Settings::default(), Model::default())
}

fn start_drawing(ed: &mut EditorState<RecordingCanvas>, from: &Id, to: &Id) -> EditRequest {
    let tap = CanvasEvent::ContextTap { node: from.clone() };
    assert!(ed.handle_canvas_event(tap).is_none());
    let done = ed
        .canvas_mut()
        .finish_edge_drawing(to)
        .expect("canvas was drawing");
    ed.handle_canvas_event(done).expect("create-flow request")
}

#[test]
fn drawn_edge_becomes_a_flow_on_confirm() {
    let mut ed = editor();
    let s = ed.new_compartment("S", 99.0).unwrap();
    let i = ed.new_compartment("I", 1.0).unwrap();

    let (source, target, provisional_edge) = match start_drawing(&mut ed, &s, &i) {
        EditRequest::CreateFlow {
            source,
            target,
            provisional_edge,
        } => (source, target, provisional_edge),
        other => panic!("expected a create-flow request, got {:?}", other),
    };
    assert_eq!((&source, &target), (&s, &i));
    assert!(ed.canvas().edge(&provisional_edge).is_some());
    assert!(ed.synchronizer().is_awaiting_flow_creation());

    let flow = ed.confirm_flow("beta*S*I").unwrap().expect("flow created");
    assert_eq!(flow, Id::from("f3"));
    assert!(ed.canvas().edge(&provisional_edge).is_none());
    assert!(ed.canvas().edge(&flow).is_some());
    assert_eq!(ed.canvas().edges().len(), 1);
    assert_eq!(ed.model().flows[0].equation, "beta*S*I");
    assert!(!ed.synchronizer().is_awaiting_flow_creation());
}

#[test]
fn cancelled_drawing_leaves_no_trace() {
    let mut ed = editor();
    let s = ed.new_compartment("S", 99.0).unwrap();
    let i = ed.new_compartment("I", 1.0).unwrap();
    start_drawing(&mut ed, &s, &i);

    assert!(ed.cancel_flow());
    assert!(ed.canvas().edges().is_empty());
    assert!(ed.model().flows.is_empty());
    assert!(!ed.cancel_flow());
    assert_eq!(ed.confirm_flow("x").unwrap(), None);
}

#[test]
fn new_drawing_replaces_unanswered_request() {
    let mut ed = editor();
    let s = ed.new_compartment("S", 99.0).unwrap();
    let i = ed.new_compartment("I", 1.0).unwrap();

    start_drawing(&mut ed, &s, &i);
    let second = start_drawing(&mut ed, &i, &s);
    assert!(matches!(
        &second,
        EditRequest::CreateFlow { source, target, .. } if *source == i && *target == s
    ));
    assert_eq!(ed.canvas().edges().len(), 1);

    assert!(ed.cancel_flow());
    assert!(ed.canvas().edges().is_empty());

    start_drawing(&mut ed, &s, &i);
    start_drawing(&mut ed, &i, &s);
    let flow = ed.confirm_flow("I").unwrap().expect("flow created");
    assert_eq!(ed.canvas().edges().keys().collect::<Vec<_>>(), vec![&flow]);
    assert_eq!(ed.model().flows[0].source, i);
}

#[test]
fn removing_an_endpoint_drops_the_pending_flow() {
    let mut ed = editor();
    let s = ed.new_compartment("S", 99.0).unwrap();
    let i = ed.new_compartment("I", 1.0).unwrap();
    start_drawing(&mut ed, &s, &i);

    ed.apply(ModelCommand::RemoveCompartment(i)).unwrap();
    assert!(!ed.synchronizer().is_awaiting_flow_creation());

    assert_eq!(ed.confirm_flow("S").unwrap(), None);
    assert!(ed.model().flows.is_empty());
    assert!(ed.canvas().edges().is_empty());
}

#[test]
fn double_click_opens_editors_with_current_data() {
    let mut ed = editor();
    let s = ed.new_compartment("S", 99.0).unwrap();
    let i = ed.new_compartment("I", 1.0).unwrap();
    let f = ed.new_flow(&s, &i, "S*I").unwrap();

    let req = ed.handle_canvas_event(CanvasEvent::DoubleClick {
        element: ElementRef::Node(s.clone()),
    });
    assert_eq!(
        req,
        Some(EditRequest::EditCompartment(Compartment::new(s.clone(), "S", 99.0)))
    );

    let req = ed.handle_canvas_event(CanvasEvent::DoubleClick {
        element: ElementRef::Edge(f.clone()),
    });
    assert!(matches!(req, Some(EditRequest::EditFlow(flow)) if flow.id == f));
}

#[test]
fn selection_follows_canvas_events_and_model_removals() {
    let mut ed = editor();
    let s = ed.new_compartment("S", 99.0).unwrap();
    ed.handle_canvas_event(CanvasEvent::Select {
        element: ElementRef::Node(s.clone()),
    });
    assert_eq!(
        ed.synchronizer().selected_element(),
        Some(&ElementRef::Node(s.clone()))
    );
    ed.apply(ModelCommand::RemoveCompartment(s)).unwrap();
    assert_eq!(ed.synchronizer().selected_element(), None);
}

#[test]
fn switching_workspaces_rebinds_the_canvas() {
    let mut ed = editor();
    ed.new_compartment("S", 99.0).unwrap();
    ed.new_compartment("I", 1.0).unwrap();

    let other = Model {
        compartments: vec![Compartment::new("c7", "X", 5.0)],
        ..Default::default()
    };
    let index = ed.add_workspace("Other", other);
    assert_eq!(ed.canvas().nodes().len(), 2);

    let report = ed.switch_workspace(index).unwrap();
    assert!(report.rebuilt);
    assert_eq!(ed.canvas().nodes().len(), 1);
    assert!(ed.canvas().node(&Id::from("c7")).is_some());

    // Ids stay unique across workspaces.
    assert_eq!(ed.new_compartment("Y", 1.0).unwrap(), Id::from("c8"));

    ed.switch_workspace(0).unwrap();
    assert_eq!(ed.canvas().nodes().len(), 2);
    assert_eq!(ed.workspaces().names(), vec!["Model 1", "Other"]);

    let report = ed.remove_workspace(0).unwrap();
    assert!(report.rebuilt);
    assert_eq!(ed.canvas().nodes().len(), 2);
    assert!(ed.remove_workspace(0).is_err());
}

#[test]
fn model_files_load_and_save() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");

    let scm = root.join("sir.scm");
    std::fs::write(
        &scm,
        r#"{"compartments":[{"id":1,"name":"S","value":99},{"id":2,"name":"I","value":1}],
            "constants":[{"id":"k1","name":"beta","value":0.3}],
            "flows":[{"id":"f1","source":1,"target":2,"equation":"beta*S*I"}]}"#,
    )?;
    let doc = ModelDoc::load(&scm)?;
    assert_eq!(doc.model.compartments.len(), 2);
    assert_eq!(doc.model.flows[0].source, Id::from("1"));

    let run = root.join("sir.scr");
    std::fs::write(
        &run,
        format!(r#"{{"model":{},"parameters":{{"endTime":50}}}}"#, doc.to_json_string()?),
    )?;
    assert_eq!(ModelDoc::load(&run)?.model, doc.model);

    let values = root.join("sir.scs");
    std::fs::write(&values, "{}")?;
    assert_eq!(FileKind::from_path(&values), Some(FileKind::Values));
    assert!(ModelDoc::load(&values).is_err());

    let mut ed = EditorState::new(RecordingCanvas::new(), Settings::default(), doc.model);
    assert_eq!(ed.canvas().edges().len(), 1);
    let r = ed.new_compartment("R", 0.0)?;
    assert_eq!(r, Id::from("c3"));
    assert!(ed.is_dirty());

    let saved = root.join("saved.scm");
    ModelDoc { model: ed.model() }.save(&saved)?;
    ed.clear_dirty();
    let reloaded = ModelDoc::load(&saved)?;
    assert_eq!(reloaded.model, ed.model());
    Ok(())
}
