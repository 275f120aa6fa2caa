dagger_module_sdk::export_module!(dagger_module_example::module());
