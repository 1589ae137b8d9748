use std::{
    collections::HashMap,
    env,
    ffi::{OsStr, OsString},
    mem,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// Mutex that allows to modify certain env variables and roll them back to initial values when
/// the corresponding [`EnvMutexGuard`] is dropped.
#[derive(Debug)]
pub(crate) struct EnvMutex(Mutex<()>);

impl EnvMutex {
    pub const fn new() -> Self {
        Self(Mutex::new(()))
    }

    pub fn lock(&'static self) -> EnvMutexGuard {
        let guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        EnvMutexGuard {
            redefined_vars: HashMap::new(),
            _inner: guard,
        }
    }
}

#[must_use = "environment will be reset"]
#[derive(Debug)]
pub(crate) struct EnvMutexGuard {
    redefined_vars: HashMap<OsString, Option<OsString>>,
    _inner: MutexGuard<'static, ()>,
}

impl Drop for EnvMutexGuard {
    fn drop(&mut self) {
        for (env_name, value) in mem::take(&mut self.redefined_vars) {
            if let Some(value) = value {
                env::set_var(env_name, value);
            } else {
                env::remove_var(env_name);
            }
        }
    }
}

impl EnvMutexGuard {
    /// Sets env vars specified in `.env`-like format.
    pub fn set_env(&mut self, fixture: &str) {
        for line in fixture.split('\n').map(str::trim) {
            if line.is_empty() {
                continue;
            }

            let (variable_name, variable_value) = line
                .split_once('=')
                .unwrap_or_else(|| panic!("Incorrect line for setting env variable: {line}"));
            let variable_name: &OsStr = variable_name.as_ref();
            let variable_value: &OsStr = variable_value.trim_matches('"').as_ref();

            self.remember(variable_name);
            env::set_var(variable_name, variable_value);
        }
    }

    /// Removes the specified env vars.
    pub fn remove_env(&mut self, var_names: &[&str]) {
        for &var_name in var_names {
            let variable_name: &OsStr = var_name.as_ref();
            self.remember(variable_name);
            env::remove_var(variable_name);
        }
    }

    fn remember(&mut self, variable_name: &OsStr) {
        if !self.redefined_vars.contains_key(variable_name) {
            let prev_value = env::var_os(variable_name);
            self.redefined_vars
                .insert(variable_name.to_os_string(), prev_value);
        }
    }
}
