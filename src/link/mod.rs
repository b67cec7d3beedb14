/*!
 * Link Module
 * Restricted link files handed to sandboxes in place of the original
 */

pub mod descriptor;
pub mod provisioner;

pub use descriptor::LinkDescriptor;
pub use provisioner::{link_file_name, LinkFile, LinkProvisioner};
