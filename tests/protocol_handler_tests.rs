use orrery::protocol::*;
use orrery::*;

fn send(handler: &mut ProtocolHandler, id: u32, command_type: &str) -> CommandResponse {
    let line = format!(r#"{{"id":{},"timestamp":0,"command_type":{}}}"#, id, command_type);
    let response = handler.handle_line(&line);
    serde_json::from_str(&response).unwrap()
}

fn ok(handler: &mut ProtocolHandler, command_type: &str) -> Option<ResponsePayload> {
    let id = handler.next_command_id();
    let response = send(handler, id, command_type);
    assert_eq!(response.status, ResponseStatus::Success, "{:?}", response.message);
    assert_eq!(response.id, id);
    response.payload
}

fn status(handler: &mut ProtocolHandler, command_type: &str) -> ResponseStatus {
    let id = handler.next_command_id();
    send(handler, id, command_type).status
}

fn handle_of(payload: Option<ResponsePayload>) -> u64 {
    match payload {
        Some(ResponsePayload::Handle { raw }) => raw,
        other => panic!("expected a handle, got {:?}", other),
    }
}

/// Running plugin with a sun of unit μ and vessel V1 on a unit circular orbit.
fn session(handler: &mut ProtocolHandler) -> u64 {
    let plugin = handle_of(ok(handler, r#"{"NewPlugin":{"initial_time":0.0,"planetarium_rotation":0.0,"config":null}}"#));
    ok(handler, &format!(r#"{{"InsertSun":{{"plugin":{},"index":0,"gravitational_parameter":1.0}}}}"#, plugin));
    ok(handler, &format!(r#"{{"EndInitialization":{{"plugin":{}}}}}"#, plugin));
    ok(handler, &format!(r#"{{"InsertOrKeepVessel":{{"plugin":{},"guid":"V1","parent":0}}}}"#, plugin));
    ok(
        handler,
        &format!(
            r#"{{"SetVesselStateOffset":{{"plugin":{},"guid":"V1","from_parent":{{"q":[1.0,0.0,0.0],"p":[0.0,1.0,0.0]}}}}}}"#,
            plugin
        ),
    );
    ok(handler, &format!(r#"{{"AdvanceTime":{{"plugin":{},"time":10.0,"planetarium_rotation":0.0}}}}"#, plugin));
    plugin
}

#[test]
fn test_command_parsing() {
    let mut handler = ProtocolHandler::new();

    let command = handler.parse_command(r#"{"id":123,"timestamp":1000,"command_type":"Ping"}"#).unwrap();
    assert_eq!(command.id, 123);
    assert_eq!(command.timestamp, 1000);
    assert!(matches!(command.command_type, CommandType::Ping));

    let command = handler
        .parse_command(r#"{"id":7,"timestamp":0,"command_type":{"InsertSun":{"plugin":1,"index":0,"gravitational_parameter":1.0}}}"#)
        .unwrap();
    if let CommandType::InsertSun { plugin, index, gravitational_parameter } = command.command_type {
        assert_eq!(plugin, 1);
        assert_eq!(index, 0);
        assert_eq!(gravitational_parameter, 1.0);
    } else {
        panic!("Expected InsertSun command type");
    }
}

#[test]
fn test_command_parsing_invalid() {
    let mut handler = ProtocolHandler::new();
    assert_eq!(handler.parse_command("{ not json").unwrap_err(), ProtocolError::InvalidJson);
    assert_eq!(
        handler.parse_command(r#"{"id":1,"timestamp":0,"command_type":"Warp"}"#).unwrap_err(),
        ProtocolError::InvalidJson
    );

    let oversized = "x".repeat(MAX_COMMAND_SIZE + 1);
    assert_eq!(handler.parse_command(&oversized).unwrap_err(), ProtocolError::MessageTooLarge);
}

#[test]
fn test_command_validation() {
    let handler = ProtocolHandler::new();
    let command = Command { id: 0, timestamp: 0, command_type: CommandType::Ping };
    assert_eq!(handler.validate_command(&command), Err(ProtocolError::InvalidCommand));

    let command = Command { id: 1, timestamp: 0, command_type: CommandType::Ping };
    assert!(handler.validate_command(&command).is_ok());
}

#[test]
fn test_malformed_lines_get_invalid_command_responses() {
    let mut handler = ProtocolHandler::new();

    let response: CommandResponse = serde_json::from_str(&handler.handle_line("garbage")).unwrap();
    assert_eq!(response.id, 0);
    assert_eq!(response.status, ResponseStatus::InvalidCommand);
    assert_eq!(response.message.as_deref(), Some("Invalid JSON format"));

    let response = send(&mut handler, 0, r#""Ping""#);
    assert_eq!(response.status, ResponseStatus::InvalidCommand);

    let oversized = "x".repeat(MAX_COMMAND_SIZE + 1);
    let response: CommandResponse = serde_json::from_str(&handler.handle_line(&oversized)).unwrap();
    assert_eq!(response.message.as_deref(), Some("Message exceeds buffer size"));
}

#[test]
fn test_ping() {
    let mut handler = ProtocolHandler::new();
    let response = send(&mut handler, 42, r#""Ping""#);
    assert_eq!(response.id, 42);
    assert_eq!(response.status, ResponseStatus::Success);
    assert!(response.payload.is_none());
    assert!(response.message.is_none());
}

#[test]
fn test_command_ids_increment() {
    let mut handler = ProtocolHandler::new();
    let first = handler.next_command_id();
    let second = handler.next_command_id();
    assert_eq!(second, first + 1);
}

#[test]
fn test_full_session_over_json() {
    let mut handler = ProtocolHandler::new();
    let plugin = session(&mut handler);
    assert_eq!(plugin, 1);

    assert_eq!(
        ok(&mut handler, &format!(r#"{{"CurrentTime":{{"plugin":{}}}}}"#, plugin)),
        Some(ResponsePayload::Time { seconds: 10.0 })
    );
    assert_eq!(
        ok(&mut handler, &format!(r#"{{"HasVessel":{{"plugin":{},"guid":"V1"}}}}"#, plugin)),
        Some(ResponsePayload::Bool { value: true })
    );
    assert!(matches!(
        ok(&mut handler, &format!(r#"{{"VesselFromParent":{{"plugin":{},"guid":"V1"}}}}"#, plugin)),
        Some(ResponsePayload::State(_))
    ));

    let transforms = handle_of(ok(
        &mut handler,
        &format!(r#"{{"NewBodyCentredNonRotatingTransforms":{{"plugin":{},"reference":0}}}}"#, plugin),
    ));
    let line = handle_of(ok(
        &mut handler,
        &format!(
            r#"{{"RenderedVesselTrajectory":{{"plugin":{},"guid":"V1","transforms":{},"sun_world":[0.0,0.0,0.0]}}}}"#,
            plugin, transforms
        ),
    ));
    assert_eq!(
        ok(&mut handler, &format!(r#"{{"NumberOfSegments":{{"line":{}}}}}"#, line)),
        Some(ResponsePayload::Count { value: 1 })
    );

    let segment = ok(&mut handler, &format!(r#"{{"FetchAndIncrement":{{"line":{}}}}}"#, line));
    match segment {
        Some(ResponsePayload::Segment { begin, .. }) => assert_eq!(begin, [1.0, 0.0, 0.0]),
        other => panic!("expected a segment, got {:?}", other),
    }
    assert_eq!(
        ok(&mut handler, &format!(r#"{{"AtEnd":{{"line":{}}}}}"#, line)),
        Some(ResponsePayload::Bool { value: true })
    );
    assert_eq!(
        status(&mut handler, &format!(r#"{{"FetchAndIncrement":{{"line":{}}}}}"#, line)),
        ResponseStatus::ResourceLifetime
    );

    ok(&mut handler, &format!(r#"{{"DeleteLine":{{"line":{}}}}}"#, line));
    ok(&mut handler, &format!(r#"{{"DeleteTransforms":{{"transforms":{}}}}}"#, transforms));
    ok(&mut handler, &format!(r#"{{"DeletePlugin":{{"plugin":{}}}}}"#, plugin));
    assert_eq!(handler.interface().live_plugins(), 0);
}

#[test]
fn test_error_statuses() {
    let mut handler = ProtocolHandler::new();
    let plugin = session(&mut handler);

    // Time cannot go backwards
    assert_eq!(
        status(&mut handler, &format!(r#"{{"AdvanceTime":{{"plugin":{},"time":5.0,"planetarium_rotation":0.0}}}}"#, plugin)),
        ResponseStatus::Sequencing
    );
    assert_eq!(
        status(&mut handler, &format!(r#"{{"InsertSun":{{"plugin":{},"index":9,"gravitational_parameter":1.0}}}}"#, plugin)),
        ResponseStatus::Sequencing
    );
    assert_eq!(
        status(&mut handler, r#"{"CurrentTime":{"plugin":999}}"#),
        ResponseStatus::UnknownReference
    );
    assert_eq!(
        status(&mut handler, &format!(r#"{{"VesselFromParent":{{"plugin":{},"guid":"V9"}}}}"#, plugin)),
        ResponseStatus::UnknownReference
    );
    assert_eq!(
        status(&mut handler, &format!(r#"{{"InsertOrKeepVessel":{{"plugin":{},"guid":"","parent":0}}}}"#, plugin)),
        ResponseStatus::MalformedInput
    );
    assert_eq!(
        status(&mut handler, &format!(r#"{{"SetPredictionLength":{{"plugin":{},"value":-1.0}}}}"#, plugin)),
        ResponseStatus::MalformedInput
    );

    let transforms = handle_of(ok(
        &mut handler,
        &format!(r#"{{"NewBodyCentredNonRotatingTransforms":{{"plugin":{},"reference":0}}}}"#, plugin),
    ));
    assert_eq!(
        status(&mut handler, &format!(r#"{{"DeletePlugin":{{"plugin":{}}}}}"#, plugin)),
        ResponseStatus::ResourceLifetime
    );
    let id = handler.next_command_id();
    let response = send(&mut handler, id, &format!(r#"{{"DeletePlugin":{{"plugin":{}}}}}"#, plugin));
    assert!(response.message.unwrap().contains("plugin"));

    ok(&mut handler, &format!(r#"{{"DeleteTransforms":{{"transforms":{}}}}}"#, transforms));
}

#[test]
fn test_manoeuvre_commands() {
    let mut handler = ProtocolHandler::new();
    let plugin = session(&mut handler);

    let manoeuvre = handle_of(ok(
        &mut handler,
        r#"{"NewManoeuvre":{"parameters":{"thrust":1.0,"initial_mass":10.0,"specific_impulse_by_weight":300.0,"right_ascension":0.0,"declination":0.0,"duration":1.0,"initial_time":20.0}}}"#,
    ));
    let info = match ok(&mut handler, &format!(r#"{{"ManoeuvreInfo":{{"manoeuvre":{}}}}}"#, manoeuvre)) {
        Some(ResponsePayload::Manoeuvre(info)) => info,
        other => panic!("expected manoeuvre info, got {:?}", other),
    };
    assert_eq!(info.final_time, 21.0);
    assert!(info.final_mass < 10.0);
    assert_eq!(info.direction, [1.0, 0.0, 0.0]);

    ok(&mut handler, &format!(r#"{{"FlightPlanInsert":{{"plugin":{},"guid":"V1","index":0,"manoeuvre":{}}}}}"#, plugin, manoeuvre));
    assert_eq!(
        ok(&mut handler, &format!(r#"{{"FlightPlanCount":{{"plugin":{},"guid":"V1"}}}}"#, plugin)),
        Some(ResponsePayload::Count { value: 1 })
    );
    ok(&mut handler, &format!(r#"{{"UpdateFlightPlan":{{"plugin":{},"guid":"V1","last_time":40.0}}}}"#, plugin));
    assert_eq!(
        ok(&mut handler, &format!(r#"{{"FlightPlanSize":{{"plugin":{},"guid":"V1"}}}}"#, plugin)),
        Some(ResponsePayload::Count { value: 3 })
    );
    assert_eq!(
        status(&mut handler, &format!(r#"{{"FlightPlanGet":{{"plugin":{},"guid":"V1","index":4}}}}"#, plugin)),
        ResponseStatus::UnknownReference
    );
    assert_eq!(
        status(&mut handler, &format!(r#"{{"ManoeuvreSetDuration":{{"manoeuvre":{},"duration":-1.0}}}}"#, manoeuvre)),
        ResponseStatus::MalformedInput
    );

    ok(&mut handler, &format!(r#"{{"DeleteManoeuvre":{{"manoeuvre":{}}}}}"#, manoeuvre));
    assert_eq!(
        status(&mut handler, &format!(r#"{{"ManoeuvreInfo":{{"manoeuvre":{}}}}}"#, manoeuvre)),
        ResponseStatus::UnknownReference
    );
}

#[test]
fn test_snapshot_streaming_over_json() {
    let mut handler = ProtocolHandler::new();
    let plugin = session(&mut handler);

    let serializer = handle_of(ok(&mut handler, &format!(r#"{{"SerializePlugin":{{"plugin":{}}}}}"#, plugin)));
    let deserializer = handle_of(ok(&mut handler, r#""NewDeserializer""#));

    loop {
        match ok(&mut handler, &format!(r#"{{"SerializerNextChunk":{{"serializer":{}}}}}"#, serializer)) {
            Some(ResponsePayload::Chunk { bytes }) => {
                let feed = Command {
                    id: handler.next_command_id(),
                    timestamp: 0,
                    command_type: CommandType::DeserializerFeed { deserializer, chunk: bytes },
                };
                let response = handler.execute(feed);
                assert_eq!(response.status, ResponseStatus::Success);
            }
            Some(ResponsePayload::StreamEnd) => break,
            other => panic!("expected a chunk, got {:?}", other),
        }
    }
    ok(&mut handler, &format!(r#"{{"DeleteSerializer":{{"serializer":{}}}}}"#, serializer));

    let restored = handle_of(ok(&mut handler, &format!(r#"{{"DeserializerFinish":{{"deserializer":{}}}}}"#, deserializer)));
    assert_ne!(restored, plugin);
    assert_eq!(
        ok(&mut handler, &format!(r#"{{"CurrentTime":{{"plugin":{}}}}}"#, restored)),
        Some(ResponsePayload::Time { seconds: 10.0 })
    );
}

#[test]
fn test_response_serialization() {
    let mut handler = ProtocolHandler::new();
    let response = handler.create_response(5, ResponseStatus::Success, None, Some(ResponsePayload::Count { value: 3 }));
    let json = handler.serialize_response(&response).unwrap();
    assert!(json.contains(r#""id":5"#));
    assert!(json.contains(r#""status":"Success""#));
    assert!(json.contains(r#""Count":{"value":3}"#));
}
