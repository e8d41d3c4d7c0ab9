use super::*;
use crate::test_support::{vehicle_json, ScriptedRemote};
use serde_json::json;

fn filled_form(kms: &str, year: &str) -> VehicleForm {
    VehicleForm {
        company: "Toyota".into(),
        model: "Corolla".into(),
        color: "Red".into(),
        kms: kms.into(),
        year: year.into(),
        available: true,
    }
}

fn ids(view: &ListView) -> Vec<CarId> {
    view.records().iter().map(|record| record.id).collect()
}

#[tokio::test]
async fn refresh_list_renders_records_in_server_order() {
    let remote = ScriptedRemote::new();
    remote
        .push_ok(json!([
            vehicle_json(3, "Honda", "Civic", 10),
            vehicle_json(1, "Toyota", "Corolla", 1000),
        ]))
        .await;
    let controller = VehicleListController::new(remote.clone());

    let view = controller.refresh_list().await.expect("refresh");

    assert_eq!(ids(&view), vec![CarId(3), CarId(1)]);
    assert_eq!(controller.view().await, view);
    let calls = remote.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!((calls[0].method, calls[0].path.as_str()), ("GET", "/cars/"));
}

#[tokio::test]
async fn empty_collection_renders_empty_state_not_error() {
    let remote = ScriptedRemote::new();
    remote.push_ok(json!([])).await;
    let controller = VehicleListController::new(remote.clone());

    let view = controller.refresh_list().await.expect("refresh");

    assert_eq!(view, ListView::Empty);
}

#[tokio::test]
async fn failed_refresh_renders_error_state_until_next_refresh() {
    let remote = ScriptedRemote::new();
    remote.push_failure("connection refused").await;
    remote.push_ok(json!([vehicle_json(1, "Toyota", "Corolla", 1000)])).await;
    let controller = VehicleListController::new(remote.clone());

    let err = controller.refresh_list().await.expect_err("must fail");
    assert!(matches!(err, ClientError::Fetch(_)));
    assert!(matches!(
        controller.view().await,
        ListView::Failed(reason) if reason.contains("connection refused")
    ));
    assert_eq!(remote.calls().await.len(), 1, "no automatic retry");

    controller.refresh_list().await.expect("second refresh");
    assert_eq!(ids(&controller.view().await), vec![CarId(1)]);
}

#[tokio::test]
async fn malformed_list_body_renders_error_state() {
    let remote = ScriptedRemote::new();
    remote.push_ok(json!({ "cars": [] })).await;
    let controller = VehicleListController::new(remote.clone());

    controller.refresh_list().await.expect_err("must fail");

    assert!(matches!(controller.view().await, ListView::Failed(_)));
}

#[tokio::test]
async fn superseded_refresh_does_not_overwrite_newer_result() {
    let remote = ScriptedRemote::new();
    let gate = remote.push_gated().await;
    remote.push_ok(json!([vehicle_json(2, "Mazda", "3", 5)])).await;
    let controller = VehicleListController::new(remote.clone());

    let stale = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.refresh_list().await })
    };
    gate.started.await.expect("first refresh started");

    controller.refresh_list().await.expect("second refresh");
    let _ = gate
        .release
        .send(Ok(json!([vehicle_json(1, "Toyota", "Corolla", 1000)])));
    stale.await.expect("join").expect("stale refresh still succeeds");

    assert_eq!(ids(&controller.view().await), vec![CarId(2)]);
}

#[tokio::test]
async fn edit_slot_follows_form_lifecycle() {
    let remote = ScriptedRemote::new();
    let controller = VehicleListController::new(remote.clone());
    assert_eq!(controller.edit_slot().await, EditSlot::Empty);

    controller.begin_edit(CarId(3), filled_form("10", "2019")).await.expect("edit");
    assert_eq!(controller.edit_slot().await, EditSlot::Editing(CarId(3)));

    controller.begin_edit(CarId(4), filled_form("10", "2019")).await.expect("edit");
    assert_eq!(controller.edit_slot().await, EditSlot::Editing(CarId(4)));

    controller.begin_create().await.expect("create");
    assert_eq!(controller.edit_slot().await, EditSlot::Empty);
    assert_eq!(
        controller.form().await.map(|form| form.values),
        Some(VehicleForm::default())
    );

    controller.begin_edit(CarId(5), filled_form("10", "2019")).await.expect("edit");
    controller.close_form().await.expect("close");
    assert_eq!(controller.edit_slot().await, EditSlot::Empty);
    assert!(controller.form().await.is_none());

    assert!(remote.calls().await.is_empty(), "form lifecycle is local");
}

#[tokio::test]
async fn begin_edit_prefills_from_snapshot() {
    let remote = ScriptedRemote::new();
    remote.push_ok(json!([vehicle_json(8, "Ford", "Focus", 42_000)])).await;
    let controller = VehicleListController::new(remote.clone());
    let view = controller.refresh_list().await.expect("refresh");
    let record = &view.records()[0];

    controller
        .begin_edit(record.id, VehicleForm::from(record))
        .await
        .expect("edit");

    let form = controller.form().await.expect("form open");
    assert_eq!(form.values.company, "Ford");
    assert_eq!(form.values.kms, "42000");
    assert_eq!(form.values.year, "2020");
    assert!(!form.submitting);
}

#[tokio::test]
async fn submit_with_empty_slot_creates_then_refreshes() {
    let remote = ScriptedRemote::new();
    remote.push_ok(json!({ "id": 11 })).await;
    remote.push_ok(json!([vehicle_json(11, "Toyota", "Corolla", 1000)])).await;
    let controller = VehicleListController::new(remote.clone());

    controller.begin_create().await.expect("create");
    controller.submit(filled_form("1000", "2020")).await.expect("submit");

    let calls = remote.calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!((calls[0].method, calls[0].path.as_str()), ("POST", "/cars/"));
    assert_eq!(
        calls[0].body,
        Some(json!({
            "company": "Toyota",
            "model": "Corolla",
            "color": "Red",
            "kms": 1000,
            "year": 2020,
            "available": true
        }))
    );
    assert_eq!((calls[1].method, calls[1].path.as_str()), ("GET", "/cars/"));
    assert_eq!(controller.edit_slot().await, EditSlot::Empty);
    assert!(controller.form().await.is_none());
    assert_eq!(ids(&controller.view().await), vec![CarId(11)]);
}

#[tokio::test]
async fn submit_with_edit_slot_updates_that_record() {
    let remote = ScriptedRemote::new();
    remote.push_ok(json!({ "id": 4 })).await;
    remote.push_ok(json!([])).await;
    let controller = VehicleListController::new(remote.clone());

    controller.begin_edit(CarId(4), filled_form("5", "2001")).await.expect("edit");
    controller.submit(filled_form("6", "2001")).await.expect("submit");

    let calls = remote.calls().await;
    assert_eq!((calls[0].method, calls[0].path.as_str()), ("PUT", "/cars/4"));
    assert_eq!(calls[0].body.as_ref().map(|body| body["kms"].clone()), Some(json!(6)));
    assert!(calls.iter().all(|call| call.method != "POST"));
    assert_eq!(controller.edit_slot().await, EditSlot::Empty);
}

#[tokio::test]
async fn non_numeric_mileage_blocks_the_request() {
    let remote = ScriptedRemote::new();
    let controller = VehicleListController::new(remote.clone());
    controller.begin_create().await.expect("create");

    let entered = filled_form("abc", "2020");
    let err = controller.submit(entered.clone()).await.expect_err("must fail");

    assert_eq!(
        err,
        ClientError::Validation(ValidationFailure {
            field: "kms",
            value: "abc".into(),
        })
    );
    assert!(remote.calls().await.is_empty());
    let form = controller.form().await.expect("form stays open");
    assert_eq!(form.values, entered);
    assert!(!form.submitting);
    assert_eq!(form.last_error, Some(err));
    assert_eq!(controller.edit_slot().await, EditSlot::Empty);
}

#[test]
fn year_must_be_a_non_negative_whole_number() {
    for raw in ["", "20.5", "-1", "twenty"] {
        let err = filled_form("1", raw).validate().expect_err(raw);
        assert_eq!(err.field, "year");
    }
    let fields = filled_form(" 12 ", "2020").validate().expect("valid");
    assert_eq!(fields.kms, 12);
}

#[tokio::test]
async fn failed_save_keeps_form_and_slot_for_retry() {
    let remote = ScriptedRemote::new();
    remote.push_failure("500: boom").await;
    remote.push_ok(json!({ "id": 7 })).await;
    remote.push_ok(json!([])).await;
    let controller = VehicleListController::new(remote.clone());
    controller.begin_edit(CarId(7), filled_form("1", "2000")).await.expect("edit");

    let entered = filled_form("2", "2000");
    let err = controller.submit(entered.clone()).await.expect_err("must fail");
    assert!(matches!(err, ClientError::Fetch(_)));

    let form = controller.form().await.expect("form stays open");
    assert_eq!(form.values, entered);
    assert!(!form.submitting);
    assert_eq!(controller.edit_slot().await, EditSlot::Editing(CarId(7)));
    assert_eq!(remote.calls().await.len(), 1, "no refresh after a failed save");

    controller.submit(form.values).await.expect("retry");
    let calls = remote.calls().await;
    assert_eq!((calls[1].method, calls[1].path.as_str()), ("PUT", "/cars/7"));
}

#[tokio::test]
async fn submit_requires_an_open_form() {
    let remote = ScriptedRemote::new();
    let controller = VehicleListController::new(remote.clone());

    let err = controller
        .submit(filled_form("1", "2000"))
        .await
        .expect_err("must fail");

    assert_eq!(err, ClientError::FormNotOpen);
    assert!(remote.calls().await.is_empty());
}

#[tokio::test]
async fn form_cannot_close_or_reopen_while_save_is_outstanding() {
    let remote = ScriptedRemote::new();
    let gate = remote.push_gated().await;
    remote.push_ok(json!([])).await;
    let controller = VehicleListController::new(remote.clone());
    controller.begin_create().await.expect("create");

    let save = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.submit(filled_form("1", "2000")).await })
    };
    gate.started.await.expect("save started");

    assert_eq!(controller.close_form().await, Err(ClientError::FormBusy));
    assert_eq!(
        controller.begin_edit(CarId(1), VehicleForm::default()).await,
        Err(ClientError::FormBusy)
    );
    assert_eq!(
        controller.submit(filled_form("1", "2000")).await,
        Err(ClientError::FormBusy)
    );
    assert_eq!(controller.edit_slot().await, EditSlot::Empty);
    assert!(controller.form().await.expect("open").submitting);

    let _ = gate.release.send(Ok(json!({ "id": 1 })));
    save.await.expect("join").expect("save");

    assert!(controller.form().await.is_none());
    controller.close_form().await.expect("close after save");
}

#[tokio::test]
async fn removed_record_is_absent_after_refresh() {
    let remote = ScriptedRemote::new();
    remote
        .push_ok(json!([
            vehicle_json(1, "Toyota", "Corolla", 1000),
            vehicle_json(2, "Honda", "Civic", 20),
        ]))
        .await;
    remote.push_ok(json!({ "message": "Car with id 2 deleted successfully" })).await;
    remote.push_ok(json!([vehicle_json(1, "Toyota", "Corolla", 1000)])).await;
    let controller = VehicleListController::new(remote.clone());
    controller.refresh_list().await.expect("refresh");

    controller.remove(CarId(2)).await.expect("remove");

    let calls = remote.calls().await;
    assert_eq!((calls[1].method, calls[1].path.as_str()), ("DELETE", "/cars/2"));
    assert!(!ids(&controller.view().await).contains(&CarId(2)));
}

#[tokio::test]
async fn failed_remove_leaves_list_as_is() {
    let remote = ScriptedRemote::new();
    remote.push_ok(json!([vehicle_json(1, "Toyota", "Corolla", 1000)])).await;
    remote.push_failure("404: Car not found to delete").await;
    let controller = VehicleListController::new(remote.clone());
    let before = controller.refresh_list().await.expect("refresh");
    let mut events = controller.subscribe_events();

    let err = controller.remove(CarId(1)).await.expect_err("must fail");

    assert!(matches!(err, ClientError::Fetch(_)));
    assert_eq!(controller.view().await, before);
    assert_eq!(remote.calls().await.len(), 2);
    match events.recv().await.expect("event") {
        FleetEvent::Error(message) => assert!(message.contains("Car not found")),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn opening_form_broadcasts_slot_and_values() {
    let remote = ScriptedRemote::new();
    let controller = VehicleListController::new(remote.clone());
    let mut events = controller.subscribe_events();

    controller.begin_edit(CarId(9), filled_form("3", "1999")).await.expect("edit");

    match events.recv().await.expect("event") {
        FleetEvent::FormOpened { slot, values } => {
            assert_eq!(slot, EditSlot::Editing(CarId(9)));
            assert_eq!(values.kms, "3");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
