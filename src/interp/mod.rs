//! A small embedded command interpreter.
//!
//! This is the host side that modules plug their commands into:
//!
//! - [`Interp`] holds a command table and evaluates scripts.
//! - [`InterpPool`] creates interpreters for one server and runs every
//!   registered init callback on each of them, so a module registers
//!   its commands once and they show up in all interpreters.

mod command;
mod parse;

pub use command::{choices_list, lookup_exact, ArcCommand, Command};
pub use parse::parse_script;

use crate::core::CommandError;

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// An interpreter: a command table plus script evaluation.
#[derive(Debug, Default)]
pub struct Interp {
    id: u64,
    commands: BTreeMap<String, ArcCommand>,
}

impl Interp {
    /// Creates an empty interpreter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier assigned by the pool; `0` for standalone interpreters.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Registers a command under its own name, replacing any previous one.
    pub fn register(&mut self, command: ArcCommand) -> Option<ArcCommand> {
        let name = command.name().to_string();
        tracing::trace!(interp = self.id, command = %name, "Registering command");
        self.commands.insert(name, command)
    }

    /// Returns `true` if a command with this name exists.
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Names of all registered commands, sorted.
    pub fn command_names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// Invokes a single command given as a word list.
    pub async fn invoke(&self, argv: &[String]) -> Result<String, CommandError> {
        let Some(name) = argv.first() else {
            return Ok(String::new());
        };
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.clone()))?;
        command.invoke(argv).await
    }

    /// Evaluates a script and returns the result of its last command.
    ///
    /// Evaluation stops at the first command that fails.
    pub async fn eval(&self, script: &str) -> Result<String, CommandError> {
        let mut result = String::new();
        for argv in parse_script(script)? {
            result = self.invoke(&argv).await?;
        }
        Ok(result)
    }
}

/// Callback run on every interpreter the pool creates.
pub type InitCallback = Arc<dyn Fn(&mut Interp) -> Result<(), CommandError> + Send + Sync>;

type ModuleSlot = Arc<dyn Any + Send + Sync>;

/// The interpreters of one server.
pub struct InterpPool {
    server: String,
    next_id: AtomicU64,
    inits: RwLock<Vec<(String, InitCallback)>>,
    modules: tokio::sync::Mutex<HashMap<String, ModuleSlot>>,
}

impl InterpPool {
    /// Creates a pool for the named server.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            next_id: AtomicU64::new(1),
            inits: RwLock::new(Vec::new()),
            modules: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// The server this pool belongs to.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Registers a callback run on every interpreter created from now on.
    pub fn register_init<F>(&self, owner: impl Into<String>, init: F)
    where
        F: Fn(&mut Interp) -> Result<(), CommandError> + Send + Sync + 'static,
    {
        let owner = owner.into();
        tracing::debug!(server = %self.server, owner = %owner, "Registered interpreter init");
        self.inits
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((owner, Arc::new(init)));
    }

    /// Creates a new interpreter and runs all init callbacks on it.
    pub fn create_interp(&self) -> Result<Interp, CommandError> {
        let mut interp = Interp {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            commands: BTreeMap::new(),
        };

        let inits = self
            .inits
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for (owner, init) in inits {
            init(&mut interp).map_err(|e| {
                tracing::error!(
                    server = %self.server,
                    owner = %owner,
                    error = %e,
                    "Interpreter init failed"
                );
                e
            })?;
        }
        Ok(interp)
    }

    /// Loads a module once.
    ///
    /// The first call for `name` runs `init` and keeps its result; later
    /// calls return the kept module without running `init` again.
    ///
    /// # Errors
    ///
    /// Fails without running `init` when `name` is already taken by a
    /// module of another type.
    pub async fn load_module<T, E, F, Fut>(&self, name: &str, init: F) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        E: From<CommandError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, E>>,
    {
        let mut modules = self.modules.lock().await;
        if let Some(existing) = modules.get(name) {
            match Arc::clone(existing).downcast::<T>() {
                Ok(module) => {
                    tracing::debug!(server = %self.server, module = %name, "Module already loaded");
                    return Ok(module);
                }
                Err(_) => {
                    tracing::error!(
                        server = %self.server,
                        module = %name,
                        "Module name already used by a different module"
                    );
                    return Err(CommandError::Failed(format!(
                        "module \"{name}\" is already loaded as a different module"
                    ))
                    .into());
                }
            }
        }

        let module = init().await?;
        modules.insert(name.to_string(), Arc::clone(&module) as ModuleSlot);
        Ok(module)
    }

    /// Returns `true` if a module with this name has been loaded.
    pub async fn is_loaded(&self, name: &str) -> bool {
        self.modules.lock().await.contains_key(name)
    }
}

impl std::fmt::Debug for InterpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let owners: Vec<String> = self
            .inits
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(owner, _)| owner.clone())
            .collect();
        f.debug_struct("InterpPool")
            .field("server", &self.server)
            .field("inits", &owners)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl Command for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(&self, args: &[String]) -> Result<String, CommandError> {
            Ok(args[1..].join(" "))
        }
    }

    #[derive(Debug)]
    struct Fail;

    #[async_trait]
    impl Command for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        async fn invoke(&self, _args: &[String]) -> Result<String, CommandError> {
            Err(CommandError::Failed("boom".into()))
        }
    }

    #[tokio::test]
    async fn test_eval_dispatches() {
        let mut interp = Interp::new();
        interp.register(Arc::new(Echo));

        assert_eq!(interp.eval("echo a {b c}").await.unwrap(), "a b c");
        assert_eq!(interp.eval("echo 1\necho 2").await.unwrap(), "2");
        assert_eq!(interp.eval("").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let interp = Interp::new();
        let err = interp.eval("nope 1").await.unwrap_err();
        assert_eq!(err.to_string(), "invalid command name \"nope\"");
    }

    #[tokio::test]
    async fn test_eval_stops_at_first_error() {
        let mut interp = Interp::new();
        interp.register(Arc::new(Echo));
        interp.register(Arc::new(Fail));

        let err = interp.eval("fail\necho never").await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_pool_runs_inits_on_each_interp() {
        let pool = InterpPool::new("main");
        pool.register_init("echo-module", |interp| {
            interp.register(Arc::new(Echo));
            Ok(())
        });

        let a = pool.create_interp().unwrap();
        let b = pool.create_interp().unwrap();
        assert!(a.has_command("echo"));
        assert!(b.has_command("echo"));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.command_names(), vec!["echo"]);
    }

    #[test]
    fn test_pool_init_failure_propagates() {
        let pool = InterpPool::new("main");
        pool.register_init("broken", |_| Err(CommandError::Failed("init failed".into())));
        assert!(pool.create_interp().is_err());
    }

    #[tokio::test]
    async fn test_load_module_runs_once() {
        let pool = InterpPool::new("main");
        let calls = AtomicU64::new(0);

        for _ in 0..3 {
            let module: Arc<String> = pool
                .load_module("m", || async {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Ok::<_, CommandError>(Arc::new("loaded".to_string()))
                })
                .await
                .unwrap();
            assert_eq!(*module, "loaded");
        }
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(pool.is_loaded("m").await);
        assert!(!pool.is_loaded("other").await);
    }

    #[tokio::test]
    async fn test_load_module_rejects_name_reused_by_other_type() {
        let pool = InterpPool::new("main");
        let _: Arc<String> = pool
            .load_module("m", || async {
                pool.register_init("m", |interp| {
                    interp.register(Arc::new(Echo));
                    Ok(())
                });
                Ok::<_, CommandError>(Arc::new("first".to_string()))
            })
            .await
            .unwrap();

        let reinit = AtomicU64::new(0);
        let err = pool
            .load_module::<u32, CommandError, _, _>("m", || async {
                reinit.fetch_add(1, Ordering::Relaxed);
                Ok(Arc::new(7))
            })
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "module \"m\" is already loaded as a different module"
        );
        assert_eq!(reinit.load(Ordering::Relaxed), 0);
        assert_eq!(format!("{pool:?}").matches("\"m\"").count(), 1);
    }

    #[tokio::test]
    async fn test_load_module_failure_is_not_kept() {
        let pool = InterpPool::new("main");
        let result: Result<Arc<String>, CommandError> = pool
            .load_module("m", || async { Err(CommandError::Failed("no db".into())) })
            .await;
        assert!(result.is_err());
        assert!(!pool.is_loaded("m").await);
    }
}
