//! Declarative macros for bundle authors.

/// Export a bundle declaration for the listed service types.
///
/// Every listed type must implement `Default`, which the host uses as the
/// no-argument constructor. Types are registered under their
/// `std::any::type_name`, in the order given.
///
/// # Example
///
/// ```rust,ignore
/// use gcdesk_plugin_sdk::prelude::*;
///
/// declare_bundle! {
///     plugins: [PauseHistogramPlugin],
///     aggregations: [PauseHistogram, CauseFrequency],
/// }
/// ```
#[macro_export]
macro_rules! declare_bundle {
    (
        plugins: [$($plugin:ty),* $(,)?],
        aggregations: [$($aggregation:ty),* $(,)?] $(,)?
    ) => {
        /// Bundle declaration read by the GC Desk host.
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static gcdesk_bundle_declaration: $crate::BundleDeclaration =
            $crate::BundleDeclaration {
                abi_version: $crate::BUNDLE_ABI_VERSION,
                rustc_version: $crate::RUSTC_VERSION,
                sdk_version: $crate::SDK_VERSION,
                register: __gcdesk_register_services,
            };

        fn __gcdesk_register_services(registrar: &mut dyn $crate::ServiceRegistrar) {
            $(
                registrar.register_plugin(::std::any::type_name::<$plugin>(), || {
                    Ok(::std::boxed::Box::new(<$plugin as ::std::default::Default>::default())
                        as ::std::boxed::Box<dyn $crate::Plugin>)
                });
            )*
            $(
                registrar.register_aggregation(::std::any::type_name::<$aggregation>(), || {
                    Ok(
                        ::std::boxed::Box::new(<$aggregation as ::std::default::Default>::default())
                            as ::std::boxed::Box<dyn $crate::Aggregation>,
                    )
                });
            )*
        }
    };
    (plugins: [$($plugin:ty),* $(,)?] $(,)?) => {
        $crate::declare_bundle! {
            plugins: [$($plugin),*],
            aggregations: [],
        }
    };
}
