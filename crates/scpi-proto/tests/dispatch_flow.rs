//! End-to-end dispatch behavior through the public API.

use scpi_proto::{
    arg_to_double, Capture, Command, Dispatcher, EventStatus, NodeId, ParamCell, Response,
    ScpiError, ERROR_RESPONSE,
};

struct Bench {
    scpi: Dispatcher,
    out: Capture,
    level: ParamCell<f64>,
    points: ParamCell<u32>,
    output: ParamCell<bool>,
}

fn bench() -> Bench {
    let out = Capture::new();
    let mut scpi = Dispatcher::new(out.clone());
    let level = ParamCell::new(-10.0);
    let points = ParamCell::new(201);
    let output = ParamCell::new(false);

    let tree = scpi.tree_mut();
    let power = tree.ensure_path("SOURce:POWer").unwrap();
    tree.add_double_parameter(power, "LEVel", level.clone(), true, true, None)
        .unwrap();
    let sweep = tree.ensure_path("SENSe:SWEep").unwrap();
    tree.add_unsigned_int_parameter(sweep, "POINts", points.clone(), true, true, None)
        .unwrap();
    tree.add_bool_parameter(NodeId::ROOT, "OUTPut", output.clone(), true, true, None)
        .unwrap();
    tree.add_command(
        NodeId::ROOT,
        Command::new("MMEMory")
            .preserve_case()
            .on_query(|call| Ok(Response::Text(call.args().join("|")))),
    )
    .unwrap();
    tree.add_command(
        NodeId::ROOT,
        Command::new("MODE").on_query(|call| Ok(Response::Text(call.args().join("|")))),
    )
    .unwrap();

    Bench {
        scpi,
        out,
        level,
        points,
        output,
    }
}

impl Bench {
    fn run(&mut self, line: &str) -> Vec<String> {
        self.scpi.input(line);
        self.scpi.process();
        self.out.take()
    }
}

#[test]
fn short_and_long_forms_resolve_identically() {
    let mut b = bench();
    for form in [
        ":SOUR:POW:LEV?",
        ":SOURCE:POWER:LEVEL?",
        ":source:pow:Level?",
        "SOURce:POWer:LEVel?",
    ] {
        assert_eq!(b.run(form), vec!["-10"], "form {form}");
    }
    assert_eq!(b.run(":SYST:ERR?"), b.run(":SYSTEM:ERROR?"));
}

#[test]
fn segments_in_mnemonic_notation_resolve_by_their_short_form() {
    let mut b = bench();
    assert_eq!(b.run(":SOURc:POWer:LEVel?"), vec!["-10"]);
    assert_eq!(b.run(":SOURcery:POWerful:LEVelled?"), vec!["-10"]);
    assert_eq!(b.run(":SOURc:POW:LEVel 2.5;LEVel?"), vec!["2.5"]);

    // The uppercase head still has to be a valid form
    assert_eq!(b.run(":SOURC:POWer:LEVel?"), vec![ERROR_RESPONSE]);
    assert_eq!(b.run(":SOu:POW:LEV?"), vec![ERROR_RESPONSE]);
    assert_eq!(b.run(":sourc:POW:LEV?"), vec![ERROR_RESPONSE]);
}

#[test]
fn partial_abbreviations_are_rejected() {
    let mut b = bench();
    assert_eq!(b.run(":SOURC:POW:LEV?"), vec![ERROR_RESPONSE]);
    assert_eq!(b.run(":SOU:POW:LEV?"), vec![ERROR_RESPONSE]);
    assert!(b.scpi.state().status().get(EventStatus::CME));
}

#[test]
fn one_line_per_statement() {
    let mut b = bench();
    // Command-only statements emit nothing, queries emit one line each
    assert!(b.run(":SOUR:POW:LEV -5").is_empty());
    assert_eq!(b.run(":SOUR:POW:LEV?"), vec!["-5"]);
    assert_eq!(b.run(":OUTP ON;:OUTP?;:OUTP OFF;:OUTP?"), vec!["TRUE", "FALSE"]);
}

#[test]
fn double_parameter_round_trips() {
    let mut b = bench();
    b.run(":SOUR:POW:LEV 3.5");
    let answer = b.run(":SOUR:POW:LEV?");
    assert_eq!(answer.len(), 1);
    assert_eq!(arg_to_double(&answer, 0), Ok(3.5));
    assert_eq!(b.level.get(), 3.5);
}

#[test]
fn unsigned_parameter_rejects_negative_without_mutation() {
    let mut b = bench();
    assert_eq!(b.run(":SENS:SWE:POIN -1;POIN?"), vec![ERROR_RESPONSE, "201"]);
    assert_eq!(b.points.get(), 201);
    assert!(b.scpi.state().status().get(EventStatus::CME));

    assert_eq!(b.run(":SENS:SWE:POIN 1001;POIN?"), vec!["1001"]);
}

#[test]
fn failing_statement_does_not_abort_line() {
    let mut b = bench();
    let lines = b.run(":SOUR:POW:LEV abc;:SOUR:POW:LEV?");
    assert_eq!(lines, vec![ERROR_RESPONSE, "-10"]);

    let esr = b.scpi.read_and_clear_status();
    assert_eq!(esr, EventStatus::CME.bits());
    assert_eq!(b.scpi.read_and_clear_status(), 0);
}

#[test]
fn missing_capability_sets_command_error() {
    let mut b = bench();
    assert_eq!(b.run(":MODE ABC"), vec![ERROR_RESPONSE]);
    assert_eq!(b.run("*CLS?"), vec![ERROR_RESPONSE]);
    assert_eq!(b.scpi.read_and_clear_status(), EventStatus::CME.bits());
    assert_eq!(b.scpi.state().errors().len(), 2);
}

#[test]
fn argument_case_normalization() {
    let mut b = bench();
    assert_eq!(b.run(":MODE? lin, Log"), vec!["LIN|LOG"]);
    assert_eq!(b.run(":MMEM? \"Cal;Set.cal\", x"), vec!["\"Cal;Set.cal\"|x"]);
}

#[test]
fn callback_failures_pass_message_through() {
    let out = Capture::new();
    let mut scpi = Dispatcher::new(out.clone());
    scpi.tree_mut()
        .add_command(
            NodeId::ROOT,
            Command::new("CALibrate")
                .on_execute(|_| Err(ScpiError::execution("no calibration kit")))
                .on_query(|_| Err(ScpiError::device("EEPROM unreadable"))),
        )
        .unwrap();

    scpi.input("CAL;CAL?;:SYST:ERR?;:SYST:ERR?");
    scpi.process();
    let lines = out.take();

    assert_eq!(lines[0], ERROR_RESPONSE);
    assert_eq!(lines[1], ERROR_RESPONSE);
    assert_eq!(lines[2], "-200,\"Execution error; no calibration kit\"");
    assert_eq!(lines[3], "-300,\"Device-specific error; EEPROM unreadable\"");

    let flags = scpi.state().status().flags();
    assert!(flags.contains(EventStatus::EXE | EventStatus::DDE));
    assert!(!flags.contains(EventStatus::CME));
}

#[test]
fn failed_registration_leaves_tree_unchanged() {
    let mut b = bench();
    let before = b.scpi.tree().command_list();
    let tree = b.scpi.tree_mut();

    assert!(matches!(
        tree.add_node(NodeId::ROOT, "SOUR"),
        Err(ScpiError::NameCollision { .. })
    ));
    assert!(matches!(
        tree.add_command(NodeId::ROOT, Command::new("outp")),
        Err(ScpiError::NameCollision { .. })
    ));
    assert!(matches!(
        tree.add_bool_parameter(NodeId::ROOT, "SYSTem", ParamCell::new(true), true, true, None),
        Err(ScpiError::NameCollision { .. })
    ));

    assert_eq!(b.scpi.tree().command_list(), before);
}

#[test]
fn on_set_hook_runs_after_assignment() {
    let out = Capture::new();
    let mut scpi = Dispatcher::new(out.clone());
    let cell = ParamCell::new(false);
    let seen = ParamCell::new(false);

    let observed = cell.clone();
    let sink = seen.clone();
    scpi.tree_mut()
        .add_bool_parameter(
            NodeId::ROOT,
            "ENABle",
            cell.clone(),
            false,
            true,
            Some(Box::new(move || sink.set(observed.get()))),
        )
        .unwrap();

    scpi.input("ENAB 1;ENAB?");
    scpi.process();
    assert!(seen.get());
    // Write-only leaf: the query form fails
    assert_eq!(out.take(), vec![ERROR_RESPONSE]);
}

#[test]
fn renamed_node_changes_path() {
    let mut b = bench();
    let source = b.scpi.tree().find("SOUR").unwrap();
    assert!(b.scpi.tree_mut().change_name(source, "GENerator"));

    assert_eq!(b.run(":GEN:POW:LEV?"), vec!["-10"]);
    assert_eq!(b.run(":SOUR:POW:LEV?"), vec![ERROR_RESPONSE]);
}

#[test]
fn output_flag_is_untouched_by_unrelated_failures() {
    let mut b = bench();
    b.run(":OUTP ON;:OUTP MAYBE");
    assert!(b.output.get());
}
