use odoo_rpc::testing::{MOCK_DATABASE, MOCK_LOGIN, MOCK_PASSWORD, MOCK_UID};
use odoo_rpc::{
    ConnectionOptions, Domain, Endpoint, Fields, Filter, MockOdoo, OdooClient, OdooError,
    OdooResult, RelationCommand, RpcError, SearchReadOptions,
};
use serde_json::{Value, json};

fn client(mock: &MockOdoo) -> OdooClient<MockOdoo> {
    OdooClient::with_session(mock.clone(), mock.session())
}

fn fields(value: Value) -> Fields {
    Fields::from_json(value).expect("field map should be valid")
}

fn seed_partners(mock: &MockOdoo) {
    mock.insert_record("res.partner", 1, json!({"name": "Azure", "city": "Ghent", "credit": 10}));
    mock.insert_record("res.partner", 2, json!({"name": "Brickwell", "city": "Leuven", "credit": 50}));
    mock.insert_record("res.partner", 3, json!({"name": "Copperline", "city": "Ghent", "credit": 30}));
}

#[tokio::test(flavor = "current_thread")]
async fn connect_valid_credentials_expected_session_uid() -> OdooResult<()> {
    let mock = MockOdoo::new();
    let options = ConnectionOptions::new("http://unused", MOCK_DATABASE, MOCK_LOGIN, MOCK_PASSWORD);

    let client = OdooClient::connect(mock.clone(), &options).await?;

    assert_eq!(client.session().uid(), MOCK_UID);
    assert_eq!(client.session().database(), MOCK_DATABASE);
    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].endpoint, Endpoint::Common);
    assert_eq!(calls[0].method, "authenticate");
    assert_eq!(
        calls[0].params,
        vec![json!("test"), json!("admin"), json!("admin"), json!({})]
    );
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn connect_bad_password_expected_connection_failed() {
    let mock = MockOdoo::new();
    let options = ConnectionOptions::new("http://unused", MOCK_DATABASE, MOCK_LOGIN, "wrong");

    let error = OdooClient::connect(mock, &options)
        .await
        .expect_err("authentication should fail");

    assert!(matches!(
        error,
        OdooError::ConnectionFailed { ref database, ref username }
            if database == "test" && username == "admin"
    ));
    assert!(error.to_string().contains("check credentials"));
}

#[tokio::test(flavor = "current_thread")]
async fn create_plain_fields_expected_single_create_call() -> OdooResult<()> {
    let mock = MockOdoo::new();
    mock.set_next_id("res.partner", 42);

    let id = client(&mock)
        .create("res.partner", &fields(json!({"name": "A"})), None)
        .await?;

    assert_eq!(id, 42);
    let calls = mock.execute_kw_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].params,
        vec![
            json!("test"),
            json!(2),
            json!("admin"),
            json!("res.partner"),
            json!("create"),
            json!([{"name": "A"}]),
        ]
    );
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn update_replace_command_expected_write_params() -> OdooResult<()> {
    let mock = MockOdoo::new();
    mock.insert_record("res.partner", 9, json!({"name": "Nine", "category_id": [1]}));

    let written = client(&mock)
        .update(
            "res.partner",
            9,
            &fields(json!({"category_id": {"action": "replace", "id": 3}})),
        )
        .await?;

    assert!(written);
    let calls = mock.execute_kw_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].operation(), Some("write"));
    assert_eq!(
        calls[0].args(),
        Some(&json!([9, {"category_id": [[6, 0, [3]]]}]))
    );
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn replace_ids_then_read_expected_exact_related_set() -> OdooResult<()> {
    let mock = MockOdoo::new();
    let client = client(&mock);

    let id = client
        .create(
            "res.partner",
            &Fields::new()
                .set("name", "Tagged")
                .relation("category_id", RelationCommand::replace([1, 2, 3])),
            None,
        )
        .await?;
    let rows = client.read("res.partner", id, &["category_id"]).await?;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("category_id"), Some(&json!([1, 2, 3])));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn relation_commands_sequence_expected_backend_state() -> OdooResult<()> {
    let mock = MockOdoo::new();
    mock.declare_relation("res.partner", "child_ids", "res.partner");
    mock.insert_record("res.partner", 1, json!({"name": "Parent", "category_id": [4, 5]}));
    let client = client(&mock);

    client
        .update(
            "res.partner",
            1,
            &Fields::new()
                .relation("category_id", RelationCommand::add([6]))
                .relation(
                    "child_ids",
                    RelationCommand::Create(vec![
                        json!({"name": "Kid"}).as_object().cloned().unwrap_or_default(),
                    ]),
                ),
        )
        .await?;
    client
        .update(
            "res.partner",
            1,
            &fields(json!({"category_id": {"action": "remove", "id": [4]}})),
        )
        .await?;

    let parent = mock.record("res.partner", 1).expect("parent exists");
    assert_eq!(parent.get("category_id"), Some(&json!([5, 6])));
    assert_eq!(parent.get("child_ids"), Some(&json!([2])));
    assert_eq!(
        mock.record("res.partner", 2).and_then(|kid| kid.get("name").cloned()),
        Some(json!("Kid"))
    );

    client
        .update("res.partner", 1, &fields(json!({"category_id": {"action": "clear"}})))
        .await?;
    assert_eq!(
        mock.record("res.partner", 1).and_then(|parent| parent.get("category_id").cloned()),
        Some(json!([]))
    );
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn read_many_ids_expected_rows_matchable_by_id() -> OdooResult<()> {
    let mock = MockOdoo::new();
    seed_partners(&mock);

    let rows = client(&mock)
        .read("res.partner", vec![3, 1], &["name"])
        .await?;

    assert_eq!(rows.len(), 2);
    let name_of = |id: i64| {
        rows.iter()
            .find(|row| row.get("id") == Some(&json!(id)))
            .and_then(|row| row.get("name").cloned())
    };
    assert_eq!(name_of(3), Some(json!("Copperline")));
    assert_eq!(name_of(1), Some(json!("Azure")));
    assert!(rows.iter().all(|row| !row.contains_key("city")));

    let calls = mock.execute_kw_calls();
    let call = &calls[0];
    assert_eq!(call.args(), Some(&json!([[3, 1]])));
    assert_eq!(call.kwargs(), Some(&json!({"fields": ["name"]})));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn read_single_id_expected_batch_read_and_all_fields() -> OdooResult<()> {
    let mock = MockOdoo::new();
    seed_partners(&mock);
    let client = client(&mock);

    let row = client.read_one("res.partner", 2, &[]).await?;

    assert_eq!(
        row.and_then(|row| row.get("city").cloned()),
        Some(json!("Leuven"))
    );
    let calls = mock.execute_kw_calls();
    let call = &calls[0];
    assert_eq!(call.args(), Some(&json!([[2]])));
    assert_eq!(call.kwargs(), None);
    assert_eq!(client.read_one("res.partner", 99, &[]).await?, None);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn search_equality_map_expected_matching_ids() -> OdooResult<()> {
    let mock = MockOdoo::new();
    seed_partners(&mock);

    let domain = Domain::try_from(json!({"city": "Ghent"}))?;
    let ids = client(&mock).search("res.partner", Some(&domain)).await?;

    assert_eq!(ids, vec![1, 3]);
    assert_eq!(
        mock.execute_kw_calls()[0].args(),
        Some(&json!([[["city", "=", "Ghent"]]]))
    );
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn search_without_domain_expected_all_ids() -> OdooResult<()> {
    let mock = MockOdoo::new();
    seed_partners(&mock);
    let client = client(&mock);

    assert_eq!(client.search("res.partner", None).await?, vec![1, 2, 3]);
    assert_eq!(client.search_count("res.partner", None).await?, 3);
    assert_eq!(mock.execute_kw_calls()[0].args(), Some(&json!([[]])));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn search_read_options_expected_verbatim_kwargs() -> OdooResult<()> {
    let mock = MockOdoo::new();
    seed_partners(&mock);

    let rows = client(&mock)
        .search_read(
            "res.partner",
            Some(&Domain::from(Filter::new("credit", ">=", 20))),
            &["name", "credit"],
            &SearchReadOptions {
                offset: Some(1),
                limit: Some(5),
                order: Some("credit desc".to_string()),
            },
        )
        .await?;

    assert_eq!(
        Value::Array(rows.into_iter().map(Value::Object).collect()),
        json!([{"id": 3, "name": "Copperline", "credit": 30}])
    );
    let calls = mock.execute_kw_calls();
    let call = &calls[0];
    assert_eq!(call.args(), Some(&json!([[["credit", ">=", 20]]])));
    assert_eq!(
        call.kwargs(),
        Some(&json!({"fields": ["name", "credit"], "offset": 1, "limit": 5, "order": "credit desc"}))
    );
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn search_like_filter_list_expected_anded_filters() -> OdooResult<()> {
    let mock = MockOdoo::new();
    seed_partners(&mock);

    let domain = Domain::from(vec![
        Filter::new("name", "ilike", "co"),
        Filter::new("city", "in", json!(["Ghent", "Brussels"])),
    ]);
    let ids = client(&mock).search("res.partner", Some(&domain)).await?;

    assert_eq!(ids, vec![3]);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn invalid_domain_expected_no_rpc_call() {
    let mock = MockOdoo::new();

    let error = client(&mock)
        .search("res.partner", Some(&Domain::from(Filter::new("", "=", 1))))
        .await
        .expect_err("empty field name should be rejected");

    assert!(matches!(error, OdooError::InvalidDomain(_)));
    assert!(mock.calls().is_empty());
}

#[test]
fn invalid_update_command_expected_rejected_before_dispatch() {
    let mock = MockOdoo::new();

    let error = Fields::from_json(json!({"line_ids": {"action": "update", "value": {"qty": 1}}}))
        .expect_err("update without id should be rejected");

    assert!(matches!(
        error,
        OdooError::InvalidRelationCommand { ref field, .. } if field == "line_ids"
    ));
    assert!(mock.calls().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn delete_records_expected_true_and_records_gone() -> OdooResult<()> {
    let mock = MockOdoo::new();
    seed_partners(&mock);

    let deleted = client(&mock).delete("res.partner", [1, 2]).await?;

    assert!(deleted);
    assert_eq!(mock.records("res.partner").len(), 1);
    assert_eq!(mock.execute_kw_calls()[0].args(), Some(&json!([[1, 2]])));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn write_missing_record_expected_remote_fault() {
    let mock = MockOdoo::new();

    let error = client(&mock)
        .update("res.partner", 404, &Fields::new().set("name", "Ghost"))
        .await
        .expect_err("missing record should fault");

    assert!(matches!(error, OdooError::Remote(RpcError::Fault { code: 2, .. })));
}

#[tokio::test(flavor = "current_thread")]
async fn injected_transport_failure_expected_propagated_unchanged() {
    let mock = MockOdoo::new();
    mock.fail_next(
        "res.partner",
        "search",
        RpcError::Transport("connection reset".to_string()),
    );

    let error = client(&mock)
        .search("res.partner", None)
        .await
        .expect_err("injected failure should surface");

    assert!(matches!(
        error,
        OdooError::Remote(RpcError::Transport(ref message)) if message == "connection reset"
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn get_fields_with_attributes_expected_filtered_descriptions() -> OdooResult<()> {
    let mock = MockOdoo::new();
    seed_partners(&mock);

    let described = client(&mock).get_fields("res.partner", &["type"]).await?;

    assert_eq!(described.get("name"), Some(&json!({"type": "char"})));
    assert_eq!(described.get("credit"), Some(&json!({"type": "integer"})));
    let calls = mock.execute_kw_calls();
    let call = &calls[0];
    assert_eq!(call.args(), Some(&json!([])));
    assert_eq!(call.kwargs(), Some(&json!({"attributes": ["type"]})));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn call_method_custom_action_expected_ids_and_kwargs() -> OdooResult<()> {
    let mock = MockOdoo::new();
    mock.respond_with("sale.order", "action_confirm", json!(true));

    let mut kwargs = serde_json::Map::new();
    kwargs.insert("context".to_string(), json!({"lang": "en_US"}));
    let result = client(&mock)
        .call_method("sale.order", "action_confirm", [5, 6], kwargs)
        .await?;

    assert_eq!(result, json!(true));
    let calls = mock.execute_kw_calls();
    let call = &calls[0];
    assert_eq!(call.args(), Some(&json!([[5, 6]])));
    assert_eq!(call.kwargs(), Some(&json!({"context": {"lang": "en_US"}})));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn unexpected_search_payload_expected_unexpected_response() {
    let mock = MockOdoo::new();
    mock.respond_with("res.partner", "search", json!({"ids": [1]}));

    let error = client(&mock)
        .search("res.partner", None)
        .await
        .expect_err("struct is not an id list");

    assert!(matches!(
        error,
        OdooError::UnexpectedResponse {
            operation: "search",
            ..
        }
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn server_version_expected_common_endpoint_struct() -> OdooResult<()> {
    let mock = MockOdoo::new();

    let version = client(&mock).server_version().await?;

    assert_eq!(version.get("server_version"), Some(&json!("17.0")));
    assert_eq!(mock.calls()[0].endpoint, Endpoint::Common);
    Ok(())
}
