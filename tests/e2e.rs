use std::process::Command;

fn run(fixture: &str) -> (String, String, bool) {
    run_with_log(fixture, "warn")
}

fn run_with_log(fixture: &str, level: &str) -> (String, String, bool) {
    let path = format!("tests/fixtures/{fixture}");
    let output = Command::new(env!("CARGO_BIN_EXE_gym-sim"))
        .arg(&path)
        .env("RUST_LOG", level)
        .env("GYM_TODAY", "2026-10-16")
        .env_remove("GYM_CURRENCY")
        .env_remove("GYM_CHAOS_RATE")
        .env_remove("GYM_DELAY_MS")
        .output()
        .expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Split the report into its sessions, cards and ledger sections
fn sections(stdout: &str) -> Vec<Vec<&str>> {
    stdout
        .split("\n\n")
        .map(|section| section.lines().collect())
        .collect()
}

#[test]
fn booking_script() {
    let (stdout, stderr, success) = run("booking.csv");

    assert!(success);
    assert!(stderr.is_empty(), "{stderr}");

    let sections = sections(&stdout);
    assert_eq!(sections.len(), 3);
    assert_eq!(
        sections[0],
        [
            "session,time_slot,capacity,reserved",
            "1,Mon 07:00,2,1",
            "2,Tue 18:30,3,0",
        ]
    );
    // no charges, so every card keeps its seeded balance
    assert_eq!(sections[1][0], "card,number,balance,valid");
    assert_eq!(sections[1][1], "1,**** **** **** 4242,1000.00,true");
    assert_eq!(
        sections[2],
        ["payment,card,amount,currency,status,reason,category,refund_of"]
    );
}

#[test]
fn payment_script() {
    let (stdout, stderr, success) = run("payments.csv");

    assert!(success);
    // declines are surfaced as warnings
    assert!(stderr.contains("charge declined"));

    let sections = sections(&stdout);
    assert_eq!(sections[0], ["session,time_slot,capacity,reserved"]);
    assert_eq!(
        sections[1],
        [
            "card,number,balance,valid",
            "1,**** **** **** 4242,1000.00,true",
            "2,**** **** **** 0002,1000.00,false",
            "3,**** **** **** 9995,10.00,true",
            "4,**** **** **** 0069,500.00,true",
            "5,**** **** **** 4444,250.00,true",
            "6,**** **** **** 0005,4900.01,true",
        ]
    );
    assert_eq!(
        sections[2],
        [
            "payment,card,amount,currency,status,reason,category,refund_of",
            "1,1,50.00,GBP,succeeded,,subscription,",
            "2,2,10.00,GBP,declined,card_declined,subscription,",
            "3,3,25.00,GBP,declined,insufficient_funds,gear_purchase,",
            "4,4,5.00,GBP,declined,expired_card,subscription,",
            "5,1,-20.00,GBP,succeeded,,subscription,1",
            "6,1,-30.00,GBP,succeeded,,subscription,1",
            "7,6,99.99,GBP,succeeded,,gear_rental,",
        ]
    );
}

#[test]
fn errors_warn_but_do_not_block() {
    let (stdout, stderr, success) = run("with_errors.csv");

    assert!(success);
    assert!(stderr.contains("unrecognized operation type 'upgrade'"));
    assert!(stderr.contains("book missing user"));
    assert!(stderr.contains("charge missing amount"));

    let sections = sections(&stdout);
    assert_eq!(sections[0][1], "1,Wed 12:00,3,1");
    assert_eq!(sections[1][1], "1,**** **** **** 4242,987.50,true");
    assert_eq!(sections[2].len(), 2);
}

#[test]
fn rejected_session_rows_are_logged() {
    let (stdout, stderr, success) = run_with_log("session_errors.csv", "info");

    assert!(success);
    assert!(stderr.contains("session added"));
    assert_eq!(stderr.matches("session skipped").count(), 2, "{stderr}");
    assert!(stderr.contains("session 1 already exists"));
    assert!(stderr.contains("cannot set capacity of session 2 to 0"));

    // the first definition of session 1 wins
    let sections = sections(&stdout);
    assert_eq!(
        sections[0],
        ["session,time_slot,capacity,reserved", "1,Mon 07:00,2,0"]
    );
}

#[test]
fn missing_argument_is_a_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_gym-sim"))
        .output()
        .expect("failed to run binary");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("usage"));
}
