mod common;

use cmdgate::{
    ArgFlags, Controller, EngineConfig, EngineError, ErrorKind, InvokerId, Listener,
    ListenerRegistry, Manager, Status,
};

fn manager() -> Manager {
    common::init_tracing();
    Manager::standalone().unwrap()
}

#[test]
fn created_commands_are_found_and_attached() {
    let manager = manager();
    for name in ["kick", "ban", "say", "tp", "help"] {
        let id = manager.create(Listener::builder(name)).unwrap();
        assert_eq!(manager.find_by_name(name), Some(id));
        assert!(manager.attached(id));
        assert!(manager.with(id, Listener::is_attached).unwrap());
    }
    assert_eq!(manager.count(), 5);
    assert_eq!(manager.find_by_name("missing"), None);
}

#[test]
fn detaching_unattached_listener_is_a_no_op() {
    let manager = manager();
    let id = manager.create(Listener::builder("kick")).unwrap();

    assert!(manager.detach_listener(id));
    assert!(!manager.attached(id));
    assert!(!manager.detach_listener(id));
    assert!(!manager.detach("kick"));
    assert!(!manager.detach("never-registered"));

    manager.attach(id).unwrap();
    assert!(manager.detach("kick"));
    assert!(manager.registry().contains(id));
}

#[test]
fn bounds_are_never_half_updated() {
    let manager = manager();
    let id = manager
        .create(Listener::builder("x").min_args(2).max_args(4))
        .unwrap();

    let err = manager.update(id, |l| l.set_min_args(5)).unwrap();
    assert_eq!(err, Err(EngineError::MinAboveMax { min: 5, max: 4 }));
    let err = manager.update(id, |l| l.set_max_args(1)).unwrap();
    assert_eq!(err, Err(EngineError::MaxBelowMin { min: 2, max: 1 }));

    let bounds = manager
        .with(id, |l| (l.min_args(), l.max_args()))
        .unwrap();
    assert_eq!(bounds, (2, 4));
}

#[test]
fn spec_errors_surface_at_registration() {
    let manager = manager();
    assert_eq!(
        manager.create(Listener::builder("x").spec("i?")).unwrap_err(),
        EngineError::InvalidSpec { ch: '?', position: 1 }
    );
    assert_eq!(
        manager.create(Listener::builder("x").spec("gs")).unwrap_err(),
        EngineError::GreedyNotLast(0)
    );
    assert!(matches!(
        manager.create(Listener::builder("x").spec("iiiiiiiiiiiiiiii")),
        Err(EngineError::SpecTooLong { declared: 16, limit: 15 })
    ));
    assert!(manager.registry().is_empty());
}

#[test]
fn arg_check_follows_the_spec() {
    let manager = manager();
    let id = manager
        .create(Listener::builder("x").spec("i f b s * g"))
        .unwrap();
    manager
        .with(id, |l| {
            assert!(l.arg_check(0, ArgFlags::INTEGER));
            assert!(!l.arg_check(0, ArgFlags::STRING));
            assert!(l.arg_check(1, ArgFlags::FLOAT));
            assert!(l.arg_check(2, ArgFlags::BOOLEAN));
            assert!(l.arg_check(3, ArgFlags::STRING));
            assert!(l.arg_check(4, ArgFlags::BOOLEAN));
            assert!(l.arg_check(5, ArgFlags::STRING));
            assert!(!l.arg_check(5, ArgFlags::INTEGER));
            assert!(l.arg_check(9, ArgFlags::FLOAT));
        })
        .unwrap();
}

#[test]
fn listeners_survive_detach_and_move_between_controllers() {
    common::init_tracing();
    let registry = ListenerRegistry::new();
    let lobby = Manager::new(registry.clone(), EngineConfig::default()).unwrap();
    let arena = Controller::new(registry.clone(), EngineConfig::default()).unwrap();

    let id = lobby
        .create(Listener::builder("ready").on_execute(|_| Ok(Status::Done)))
        .unwrap();
    arena.attach(id).unwrap();

    assert_eq!(
        lobby.run(InvokerId(1), "ready"),
        Err(ErrorKind::UnknownCommand)
    );
    assert_eq!(arena.run(InvokerId(1), "ready"), Ok(Status::Done));
    assert_eq!(registry.with(id, Listener::controller).unwrap(), Some(arena.id()));
}

#[test]
fn removed_handles_are_rejected() {
    let manager = manager();
    let id = manager.create(Listener::builder("kick")).unwrap();
    manager.remove(id).unwrap();

    assert_eq!(manager.remove(id).unwrap_err(), EngineError::StaleListener(id));
    assert!(manager.attach(id).is_err());
    assert!(manager.auth_check(id, InvokerId(1)).is_err());

    let reused = manager.create(Listener::builder("kick")).unwrap();
    assert_ne!(reused, id);
    assert_eq!(manager.find_by_name("kick"), Some(reused));
}

#[test]
fn enumeration_visits_a_snapshot() {
    let manager = manager();
    for name in ["c", "a", "b"] {
        manager.create(Listener::builder(name)).unwrap();
    }
    manager.sort();

    let mut names = Vec::new();
    manager.foreach_command(|command| {
        names.push(command.name().to_string());
        manager.detach(command.name());
    });
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(manager.count(), 0);
}

#[test]
fn command_info_describes_the_listener() {
    let manager = manager();
    let id = manager
        .create(
            Listener::builder("kick")
                .spec("is")
                .tags(["id", "reason"])
                .min_args(1)
                .max_args(2)
                .authority(2)
                .protected(true)
                .help("Remove a player from the server")
                .info("admin"),
        )
        .unwrap();

    let info = manager.with(id, Listener::describe).unwrap();
    assert_eq!(info.usage, "kick <id:integer> [reason:string]");
    assert_eq!(info.tags, vec![Some("id".to_string()), Some("reason".to_string())]);
    assert!(info.protected);

    let list = manager.commands();
    assert_eq!(list, vec![info]);
}

#[test]
fn config_comes_from_toml() {
    let config = EngineConfig::from_toml_str(
        r#"
        max_args = 4
        default_authority = 1
        "#,
    )
    .unwrap();
    let manager = Manager::new(ListenerRegistry::new(), config).unwrap();
    let id = manager
        .create(Listener::builder("x").protected(true).on_execute(|_| Ok(Status::Done)))
        .unwrap();

    assert_eq!(manager.with(id, Listener::max_args).unwrap(), 3);
    assert_eq!(manager.run(InvokerId(1), "x"), Err(ErrorKind::InsufficientAuth));
    assert_eq!(
        manager.run(InvokerId(1), "x 1 2 3 4"),
        Err(ErrorKind::InsufficientAuth)
    );

    manager.update(id, |l| l.set_protected(false)).unwrap();
    assert_eq!(
        manager.run(InvokerId(1), "x 1 2 3 4"),
        Err(ErrorKind::ExtraneousArgs)
    );
}
