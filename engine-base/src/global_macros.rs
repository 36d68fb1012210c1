/// Declares a process-wide, lazily-initialized singleton for `$instance_struct`.
///
/// Used only where the design explicitly calls for a process-wide subsystem with
/// explicit init (the modifier/analyzer type registry, the log sink hook) — never for
/// ordinary component state, which is owned by whoever constructs the component.
#[macro_export]
macro_rules! make_available_globally_on_demand {
    ($instance_struct:ident) => {
        // Each invocation gets its own module (named after the struct, a different
        // namespace so it can't collide with the type itself) so that two singletons
        // can be declared side by side in the same enclosing module without their
        // `INSTANCE` statics clashing.
        #[allow(non_snake_case)]
        mod $instance_struct {
            static INSTANCE: std::sync::OnceLock<fragile::Fragile<super::$instance_struct>> =
                std::sync::OnceLock::new();

            impl super::$instance_struct {
                /// Installs the global instance. A no-op if one is already installed.
                pub fn make_available_globally(create_instance: impl FnOnce() -> super::$instance_struct) {
                    if INSTANCE.get().is_some() {
                        return;
                    }
                    let _ = INSTANCE.set(fragile::Fragile::new(create_instance()));
                }

                pub fn is_loaded() -> bool {
                    INSTANCE.get().is_some()
                }

                /// # Panics
                ///
                /// Panics if `make_available_globally` hasn't been called yet, or if
                /// called from a thread other than the one that installed the instance.
                pub fn get() -> &'static super::$instance_struct {
                    INSTANCE
                        .get()
                        .expect("call make_available_globally() before get()")
                        .get()
                }
            }
        }
    };
}
